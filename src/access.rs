//! Cache-aside access to plans and subscriptions.
//!
//! Reads try the cache first and fall back to the store, repopulating the
//! cache on the way out. Writes go to the store first and then refresh or
//! drop the cache entry. The cache is never authoritative: every cache call
//! is best effort, so a broken cache costs latency but never correctness.

use crate::cache::keys;
use crate::error::{Result, SubledgerError};
use crate::models::{NewSubscription, NewUser, Plan, Subscription, User};
use crate::retry::RetryPolicy;
use crate::store::SubscriptionStore;
use crate::traits::cache::{Cache, decode, encode};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// TTL applied to the cached plan catalog
pub const PLANS_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Delay before a dropped subscription entry is dropped a second time.
///
/// A read that missed the cache before a cancel or expiry can refill the
/// entry with the old row after the first delete; the repeat bounds how long
/// that row stays visible.
pub const REINVALIDATE_AFTER: Duration = Duration::from_secs(2);

/// Mediates every read and write of plan and subscription data
#[derive(Clone)]
pub struct DataAccess {
    store: Arc<dyn SubscriptionStore>,
    cache: Arc<dyn Cache>,
    retry: RetryPolicy,
}

impl DataAccess {
    pub fn new(store: Arc<dyn SubscriptionStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    // ----- reads -----

    /// The full plan catalog
    pub async fn get_plans(&self) -> Result<Vec<Plan>> {
        if let Some(plans) = self.cached::<Vec<Plan>>(keys::PLANS).await {
            return Ok(plans);
        }

        let plans = self
            .retry
            .critical("store.list_plans", || self.store.list_plans())
            .await?;

        self.put(keys::PLANS, &plans, PLANS_TTL).await;
        Ok(plans)
    }

    /// A single plan, straight from the store
    pub async fn get_plan(&self, plan_id: i64) -> Result<Plan> {
        self.retry
            .critical("store.get_plan", || self.store.get_plan(plan_id))
            .await?
            .ok_or_else(|| SubledgerError::not_found(format!("Plan {} not found", plan_id)))
    }

    /// The user's current subscription
    pub async fn get_subscription(&self, user_id: i64) -> Result<Subscription> {
        let key = keys::subscription(user_id);
        if let Some(subscription) = self.cached::<Subscription>(&key).await {
            return Ok(subscription);
        }

        let subscription = self.load_subscription(user_id).await?;
        self.cache_subscription(&subscription).await;
        Ok(subscription)
    }

    /// The user's subscription from the store, bypassing the cache
    pub async fn load_subscription(&self, user_id: i64) -> Result<Subscription> {
        self.retry
            .critical("store.get_subscription", || {
                self.store.get_subscription(user_id)
            })
            .await?
            .ok_or_else(|| {
                SubledgerError::not_found(format!("No subscription for user {}", user_id))
            })
    }

    // ----- writes -----

    /// Persist a new subscription, then cache it
    pub async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        let subscription = self
            .retry
            .critical("store.insert_subscription", || {
                self.store.insert_subscription(new.clone())
            })
            .await?;

        self.cache_subscription(&subscription).await;
        Ok(subscription)
    }

    /// Overwrite a subscription, then refresh its cache entry
    pub async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let saved = self
            .retry
            .critical("store.update_subscription", || {
                self.store.update_subscription(subscription)
            })
            .await?;

        self.cache_subscription(&saved).await;
        Ok(saved)
    }

    /// Cancel and remove the user's subscription, then drop its cache entry
    pub async fn cancel_subscription(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let cancelled = self
            .retry
            .critical("store.cancel_subscription", || {
                self.store.cancel_subscription(user_id, now)
            })
            .await?;

        self.invalidate_subscription(user_id).await;
        Ok(cancelled)
    }

    pub async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        self.retry
            .critical("store.find_due_for_expiry", || {
                self.store.find_due_for_expiry(now)
            })
            .await
    }

    /// Expire one subscription and drop its cache entry.
    ///
    /// Returns whether the row changed.
    pub async fn expire_subscription(
        &self,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = self
            .retry
            .critical("store.mark_expired", || {
                self.store.mark_expired(subscription.id, now)
            })
            .await?;

        if changed {
            self.invalidate_subscription(subscription.user_id).await;
        }
        Ok(changed)
    }

    pub async fn insert_user(&self, new: NewUser) -> Result<User> {
        self.retry
            .critical("store.insert_user", || self.store.insert_user(new.clone()))
            .await
    }

    // ----- cache side effects -----

    /// Cache `subscription` until its end date
    pub async fn cache_subscription(&self, subscription: &Subscription) {
        let ttl = subscription.cache_ttl(Utc::now());
        self.put(&keys::subscription(subscription.user_id), subscription, ttl)
            .await;
    }

    /// Drop the cached subscription now and once more after
    /// [`REINVALIDATE_AFTER`]
    pub async fn invalidate_subscription(&self, user_id: i64) {
        let key = keys::subscription(user_id);
        self.retry
            .best_effort("cache.delete", || self.cache.delete(&key))
            .await;

        let cache = self.cache.clone();
        let retry = self.retry;
        tokio::spawn(async move {
            tokio::time::sleep(REINVALIDATE_AFTER).await;
            retry
                .best_effort("cache.delete", || cache.delete(&key))
                .await;
            tracing::debug!(key, "stale refill window closed");
        });
    }

    /// Remember the most recently issued session token for a user
    pub async fn cache_session_token(&self, user_id: i64, token: &str, ttl: Duration) {
        self.put(&keys::session(user_id), &token, ttl).await;
    }

    /// Cached value for `key`, treating backend errors and undecodable
    /// payloads as a miss
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self
            .retry
            .best_effort("cache.get", || self.cache.get_bytes(key))
            .await
            .flatten();

        let Some(bytes) = bytes else {
            tracing::debug!(key, "cache miss");
            return None;
        };

        match decode(&bytes) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    async fn put<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match encode(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key, error = %e, "Skipping cache write");
                return;
            }
        };

        let written = self
            .retry
            .best_effort("cache.set", || {
                self.cache.set_bytes(key, bytes.clone(), Some(ttl))
            })
            .await;

        if written.is_some() {
            tracing::debug!(key, ttl_secs = ttl.as_secs(), "cache populated");
        }
    }
}
