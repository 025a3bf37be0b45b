//! HTTP surface: route modules, the JSON body extractor and response envelopes.

mod extract;
mod plans;
mod response;
mod routes;
mod subscriptions;
mod users;

pub use extract::JsonBody;
pub use plans::PlanRoutes;
pub use response::{DataResponse, TokenResponse};
pub use routes::RouteModule;
pub use subscriptions::{ChangePlanRequest, CreateSubscriptionRequest, SubscriptionRoutes};
pub use users::{RegisterRequest, UserRoutes};
