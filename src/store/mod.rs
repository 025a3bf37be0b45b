//! Persistent store: the source of truth for users, plans and subscriptions.
//!
//! [`SubscriptionStore`] is implemented by [`SeaOrmStore`] (Postgres) and by
//! [`InMemoryStore`], which backs development mode and the test suite.

mod in_memory;
#[cfg(feature = "database")]
mod sea_orm_store;

pub use in_memory::InMemoryStore;
#[cfg(feature = "database")]
pub use sea_orm_store::SeaOrmStore;

use crate::error::Result;
use crate::models::{NewSubscription, NewUser, Plan, Subscription, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Storage operations the data access layer and lifecycle engine rely on.
///
/// Implementations report a duplicate subscription for a user as
/// `SubledgerError::Conflict` and connectivity problems as retryable errors.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Full plan catalog ordered by id
    async fn list_plans(&self) -> Result<Vec<Plan>>;

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>>;

    /// The user's subscription row, if one exists
    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>>;

    /// Insert a subscription.
    ///
    /// Fails with `Conflict` if the user already has a row.
    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription>;

    /// Overwrite an existing row with `subscription`, matched by id.
    ///
    /// Fails with `NotFound` if the row has gone.
    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Mark the user's subscription cancelled and delete it, atomically.
    ///
    /// Returns the row as it was at cancellation (status `Cancelled`). Fails
    /// with `NotFound` when the user has no subscription; a failure part way
    /// leaves the original row untouched.
    async fn cancel_subscription(&self, user_id: i64, now: DateTime<Utc>) -> Result<Subscription>;

    /// Active subscriptions whose end date is at or before `now`
    async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>>;

    /// Set one subscription to `Expired` if it is still active and due.
    ///
    /// Returns `false` when the row is gone or no longer qualifies, which
    /// makes repeated sweeps harmless.
    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool>;

    async fn insert_user(&self, new: NewUser) -> Result<User>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;
}
