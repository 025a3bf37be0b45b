use crate::app::AppContext;
use crate::error::Result;
use crate::http::{JsonBody, RouteModule, TokenResponse};
use axum::{Router, extract::State, routing::post};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
}

/// `/api/user`
pub struct UserRoutes;

impl RouteModule for UserRoutes {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/register", post(register))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api/user")
    }
}

async fn register(
    State(ctx): State<AppContext>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<TokenResponse> {
    let registered = ctx.users().register(req.name, req.password).await?;
    Ok(TokenResponse {
        token: registered.token,
    })
}
