use super::SubscriptionStore;
use crate::error::{Result, SubledgerError};
use crate::models::{
    NewSubscription, NewUser, Plan, Subscription, SubscriptionStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store.
///
/// Enforces the same one-subscription-per-user rule as the database schema.
/// Wraps data in Arc for cheap cloning.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    plans: BTreeMap<i64, Plan>,
    subscriptions: BTreeMap<i64, Subscription>,
    users: BTreeMap<i64, User>,
    next_subscription_id: i64,
    next_user_id: i64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose catalog holds `plans`
    pub async fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        let store = Self::new();
        for plan in plans {
            store.upsert_plan(plan).await;
        }
        store
    }

    /// Add or replace a catalog entry
    pub async fn upsert_plan(&self, plan: Plan) {
        self.inner.write().await.plans.insert(plan.id, plan);
    }

    /// Write a subscription row as-is, bypassing the uniqueness check
    pub async fn put_subscription(&self, subscription: Subscription) {
        let mut tables = self.inner.write().await;
        tables.next_subscription_id = tables.next_subscription_id.max(subscription.id);
        tables.subscriptions.insert(subscription.id, subscription);
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.read().await.subscriptions.len()
    }

    pub async fn get_user(&self, user_id: i64) -> Option<User> {
        self.inner.read().await.users.get(&user_id).cloned()
    }
}

impl Tables {
    fn subscription_id_for_user(&self, user_id: i64) -> Option<i64> {
        self.subscriptions
            .values()
            .find(|s| s.user_id == user_id)
            .map(|s| s.id)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        Ok(self.inner.read().await.plans.values().cloned().collect())
    }

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        Ok(self.inner.read().await.plans.get(&plan_id).cloned())
    }

    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        let tables = self.inner.read().await;
        Ok(tables
            .subscription_id_for_user(user_id)
            .and_then(|id| tables.subscriptions.get(&id).cloned()))
    }

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        let mut tables = self.inner.write().await;

        if tables.subscription_id_for_user(new.user_id).is_some() {
            return Err(SubledgerError::conflict(format!(
                "User {} already has a subscription",
                new.user_id
            )));
        }

        tables.next_subscription_id += 1;
        let now = Utc::now();
        let subscription = Subscription {
            id: tables.next_subscription_id,
            user_id: new.user_id,
            plan_id: new.plan_id,
            status: new.status,
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        };
        tables.subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let mut tables = self.inner.write().await;
        let row = tables.subscriptions.get_mut(&subscription.id).ok_or_else(|| {
            SubledgerError::not_found(format!("Subscription {} not found", subscription.id))
        })?;
        *row = subscription.clone();
        Ok(row.clone())
    }

    async fn cancel_subscription(&self, user_id: i64, now: DateTime<Utc>) -> Result<Subscription> {
        let mut tables = self.inner.write().await;
        let id = tables.subscription_id_for_user(user_id).ok_or_else(|| {
            SubledgerError::not_found(format!("No subscription for user {}", user_id))
        })?;

        let mut cancelled = tables.subscriptions.remove(&id).ok_or_else(|| {
            SubledgerError::not_found(format!("No subscription for user {}", user_id))
        })?;
        cancelled.status = SubscriptionStatus::Cancelled;
        cancelled.updated_at = now;
        Ok(cancelled)
    }

    async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        Ok(self
            .inner
            .read()
            .await
            .subscriptions
            .values()
            .filter(|s| s.is_due_for_expiry(now))
            .cloned()
            .collect())
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.inner.write().await;
        match tables.subscriptions.get_mut(&subscription_id) {
            Some(row) if row.is_due_for_expiry(now) => {
                row.status = SubscriptionStatus::Expired;
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        let mut tables = self.inner.write().await;
        tables.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            name: new.name,
            password_hash: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::plan;

    #[tokio::test]
    async fn test_insert_assigns_ids_and_rejects_duplicates() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let basic = plan(1, 30);

        let first = store
            .insert_subscription(NewSubscription::active(7, &basic, now).unwrap())
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.status, SubscriptionStatus::Active);

        let err = store
            .insert_subscription(NewSubscription::active(7, &basic, now).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SubledgerError::Conflict(_)));
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_cancel_removes_row_and_returns_cancelled() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .insert_subscription(NewSubscription::active(7, &plan(1, 30), now).unwrap())
            .await
            .unwrap();

        let cancelled = store.cancel_subscription(7, now).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(store.get_subscription(7).await.unwrap().is_none());

        let err = store.cancel_subscription(7, now).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mark_expired_only_touches_due_rows() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let sub = store
            .insert_subscription(NewSubscription::active(7, &plan(1, 0), now).unwrap())
            .await
            .unwrap();

        assert_eq!(store.find_due_for_expiry(now).await.unwrap().len(), 1);
        assert!(store.mark_expired(sub.id, now).await.unwrap());
        assert!(!store.mark_expired(sub.id, now).await.unwrap());
        assert!(store.find_due_for_expiry(now).await.unwrap().is_empty());
        assert!(!store.mark_expired(999, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let sub = store
            .insert_subscription(NewSubscription::active(7, &plan(1, 30), now).unwrap())
            .await
            .unwrap();
        store.cancel_subscription(7, now).await.unwrap();

        let err = store.update_subscription(&sub).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
