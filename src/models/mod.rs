//! Domain records shared by the store, cache and HTTP layers.

mod plan;
mod subscription;
mod user;

pub use plan::Plan;
pub use subscription::{
    EXPIRED_ENTRY_TTL, NewSubscription, Subscription, SubscriptionStatus, period_for,
};
pub use user::{NewUser, User};
