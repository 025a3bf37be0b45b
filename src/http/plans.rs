use crate::app::AppContext;
use crate::error::Result;
use crate::http::{DataResponse, RouteModule};
use crate::models::Plan;
use axum::{Router, extract::State, routing::get};

/// `/api/plans`, public
pub struct PlanRoutes;

impl RouteModule for PlanRoutes {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/api/plans", get(list_plans))
    }
}

async fn list_plans(State(ctx): State<AppContext>) -> Result<DataResponse<Vec<Plan>>> {
    let plans = ctx.access().get_plans().await?;
    Ok(DataResponse::new(plans))
}
