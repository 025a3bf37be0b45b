use crate::access::DataAccess;
use crate::error::Result;
use crate::models::{NewSubscription, Subscription};
use chrono::Utc;

/// Request-driven subscription transitions
#[derive(Clone)]
pub struct SubscriptionService {
    access: DataAccess,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(access: DataAccess) -> Self {
        Self { access }
    }

    pub fn access(&self) -> &DataAccess {
        &self.access
    }

    /// The user's current subscription
    pub async fn get(&self, user_id: i64) -> Result<Subscription> {
        self.access.get_subscription(user_id).await
    }

    /// Subscribe `user_id` to `plan_id` starting now.
    ///
    /// Fails with `NotFound` for an unknown plan and `Conflict` when the user
    /// already has a subscription row.
    pub async fn create(&self, user_id: i64, plan_id: i64) -> Result<Subscription> {
        let plan = self.access.get_plan(plan_id).await?;
        let new = NewSubscription::active(user_id, &plan, Utc::now())?;

        let subscription = self.access.insert_subscription(new).await?;
        tracing::info!(
            user_id,
            plan_id,
            subscription_id = subscription.id,
            end_date = %subscription.end_date,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Move the user onto `new_plan_id` with a fresh period starting now.
    ///
    /// Time left on the previous plan is discarded.
    pub async fn update(&self, user_id: i64, new_plan_id: i64) -> Result<Subscription> {
        let mut subscription = self.access.load_subscription(user_id).await?;
        let plan = self.access.get_plan(new_plan_id).await?;
        let previous_plan_id = subscription.plan_id;

        subscription.restart_on(&plan, Utc::now())?;
        let saved = self.access.update_subscription(&subscription).await?;

        tracing::info!(
            user_id,
            from_plan_id = previous_plan_id,
            to_plan_id = new_plan_id,
            end_date = %saved.end_date,
            "Subscription plan changed"
        );
        Ok(saved)
    }

    /// Cancel and remove the user's subscription, returning it as cancelled
    pub async fn cancel(&self, user_id: i64) -> Result<Subscription> {
        let cancelled = self.access.cancel_subscription(user_id, Utc::now()).await?;
        tracing::info!(
            user_id,
            subscription_id = cancelled.id,
            plan_id = cancelled.plan_id,
            "Subscription cancelled"
        );
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::error::SubledgerError;
    use crate::models::SubscriptionStatus;
    use crate::retry::RetryPolicy;
    use crate::store::InMemoryStore;
    use crate::testing::doubles::{FlakyStore, UnreachableCache};
    use crate::testing::fixtures::{plan, subscription_ending};
    use std::sync::Arc;

    async fn service() -> (SubscriptionService, InMemoryStore) {
        let store = InMemoryStore::with_plans([plan(1, 30), plan(2, 30), plan(3, 365)]).await;
        let access = DataAccess::new(Arc::new(store.clone()), Arc::new(InMemoryCache::new(100)));
        (SubscriptionService::new(access), store)
    }

    #[tokio::test]
    async fn test_create_starts_period_now() {
        let (service, _) = service().await;
        let before = Utc::now();

        let sub = service.create(7, 3).await.unwrap();

        assert_eq!(sub.plan_id, 3);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.start_date >= before);
        assert_eq!(sub.end_date - sub.start_date, chrono::Duration::days(365));
    }

    #[tokio::test]
    async fn test_create_unknown_plan_is_not_found() {
        let (service, store) = service().await;
        assert!(service.create(7, 99).await.unwrap_err().is_not_found());
        assert_eq!(store.subscription_count().await, 0);
    }

    #[tokio::test]
    async fn test_second_create_conflicts() {
        let (service, _) = service().await;
        service.create(7, 1).await.unwrap();

        let err = service.create(7, 2).await.unwrap_err();
        assert!(matches!(err, SubledgerError::Conflict(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_have_one_winner() {
        let (service, store) = service().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move { service.create(7, 1 + i % 3).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(SubledgerError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.subscription_count().await, 1);
    }

    #[tokio::test]
    async fn test_upgrade_discards_old_end_date() {
        let (service, store) = service().await;
        let old_end = Utc::now() + chrono::Duration::days(200);
        store.put_subscription(subscription_ending(1, 7, old_end)).await;
        let before = Utc::now();

        let sub = service.update(7, 2).await.unwrap();

        assert_eq!(sub.plan_id, 2);
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.start_date >= before);
        assert_eq!(sub.end_date - sub.start_date, chrono::Duration::days(30));
        assert!(sub.end_date < old_end);
        assert_eq!(service.get(7).await.unwrap(), sub);
    }

    #[tokio::test]
    async fn test_update_reactivates_expired_subscription() {
        let (service, store) = service().await;
        let mut expired = subscription_ending(1, 7, Utc::now() - chrono::Duration::days(1));
        expired.status = SubscriptionStatus::Expired;
        store.put_subscription(expired).await;

        let sub = service.update(7, 1).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.end_date > Utc::now());
    }

    #[tokio::test]
    async fn test_update_requires_subscription_then_plan() {
        let (service, _) = service().await;
        assert!(service.update(7, 2).await.unwrap_err().is_not_found());

        service.create(7, 1).await.unwrap();
        assert!(service.update(7, 99).await.unwrap_err().is_not_found());
        assert_eq!(service.get(7).await.unwrap().plan_id, 1);
    }

    #[tokio::test]
    async fn test_cancel_then_read_is_not_found() {
        let (service, _) = service().await;
        service.create(7, 1).await.unwrap();
        // Warm the cache so a stale read would be possible
        service.get(7).await.unwrap();

        let cancelled = service.cancel(7).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);

        assert!(service.get(7).await.unwrap_err().is_not_found());
        assert!(service.cancel(7).await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_succeed_with_unreachable_cache() {
        let store = InMemoryStore::with_plans([plan(1, 30), plan(2, 90)]).await;
        let access = DataAccess::new(Arc::new(store), Arc::new(UnreachableCache::new()));
        let service = SubscriptionService::new(access);

        let created = service.create(7, 1).await.unwrap();
        let updated = service.update(7, 2).await.unwrap();

        assert_eq!(created.plan_id, 1);
        assert_eq!(updated.plan_id, 2);
        assert_eq!(service.get(7).await.unwrap(), updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_surfaces_after_retries() {
        let store = FlakyStore::down(
            InMemoryStore::with_plans([plan(1, 30)]).await,
            "insert_subscription",
        );
        let store = Arc::new(store);
        let access = DataAccess::new(store.clone(), Arc::new(InMemoryCache::new(100)))
            .with_retry(RetryPolicy::default());
        let service = SubscriptionService::new(access);

        let err = service.create(7, 1).await.unwrap_err();

        assert!(matches!(err, SubledgerError::Unavailable(_)));
        assert_eq!(store.attempts(), 3);
    }
}
