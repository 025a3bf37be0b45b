//! The caller's own subscription. Every route requires a bearer token and
//! acts on the user id carried in it.

use crate::app::AppContext;
use crate::auth::AuthUser;
use crate::error::Result;
use crate::http::{DataResponse, JsonBody, RouteModule};
use crate::models::Subscription;
use axum::{Router, extract::State, routing::get};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub plan_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub new_plan_id: i64,
}

/// `/api/subs/subscription`
pub struct SubscriptionRoutes;

impl RouteModule for SubscriptionRoutes {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route(
            "/subscription",
            get(get_subscription)
                .post(create_subscription)
                .put(change_plan)
                .delete(cancel_subscription),
        )
    }

    fn prefix(&self) -> Option<&str> {
        Some("/api/subs")
    }
}

async fn get_subscription(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<DataResponse<Subscription>> {
    let subscription = ctx.subscriptions().get(user_id).await?;
    Ok(DataResponse::new(subscription))
}

async fn create_subscription(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    JsonBody(req): JsonBody<CreateSubscriptionRequest>,
) -> Result<DataResponse<Subscription>> {
    let subscription = ctx.subscriptions().create(user_id, req.plan_id).await?;
    Ok(DataResponse::new(subscription))
}

async fn change_plan(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
    JsonBody(req): JsonBody<ChangePlanRequest>,
) -> Result<DataResponse<Subscription>> {
    let subscription = ctx.subscriptions().update(user_id, req.new_plan_id).await?;
    Ok(DataResponse::new(subscription))
}

async fn cancel_subscription(
    State(ctx): State<AppContext>,
    AuthUser(user_id): AuthUser,
) -> Result<DataResponse<Subscription>> {
    let subscription = ctx.subscriptions().cancel(user_id).await?;
    Ok(DataResponse::new(subscription))
}
