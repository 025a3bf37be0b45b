//! Store and cache doubles for exercising the cache-aside and retry paths.
//!
//! - [`CountingStore`] counts calls per operation.
//! - [`FlakyStore`] fails a chosen operation a fixed number of times.
//! - [`UnreachableCache`] fails every call.
//! - [`RecordingCache`] remembers the TTL of every write.

use crate::cache::InMemoryCache;
use crate::error::{Result, SubledgerError};
use crate::models::{NewSubscription, NewUser, Plan, Subscription, User};
use crate::store::{InMemoryStore, SubscriptionStore};
use crate::traits::cache::Cache;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

// =============================================================================
// CountingStore
// =============================================================================

/// [`InMemoryStore`] wrapper that counts calls per operation name
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    calls: Mutex<HashMap<&'static str, u32>>,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Number of times `op` (a trait method name) was called
    pub fn calls(&self, op: &str) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.get(op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record(&self, op: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(op).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl SubscriptionStore for CountingStore {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.record("list_plans");
        self.inner.list_plans().await
    }

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        self.record("get_plan");
        self.inner.get_plan(plan_id).await
    }

    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        self.record("get_subscription");
        self.inner.get_subscription(user_id).await
    }

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        self.record("insert_subscription");
        self.inner.insert_subscription(new).await
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.record("update_subscription");
        self.inner.update_subscription(subscription).await
    }

    async fn cancel_subscription(&self, user_id: i64, now: DateTime<Utc>) -> Result<Subscription> {
        self.record("cancel_subscription");
        self.inner.cancel_subscription(user_id, now).await
    }

    async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        self.record("find_due_for_expiry");
        self.inner.find_due_for_expiry(now).await
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.record("mark_expired");
        self.inner.mark_expired(subscription_id, now).await
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        self.record("insert_user");
        self.inner.insert_user(new).await
    }

    async fn ping(&self) -> Result<()> {
        self.record("ping");
        self.inner.ping().await
    }
}

// =============================================================================
// FlakyStore
// =============================================================================

/// [`InMemoryStore`] wrapper whose `op` fails the next `times` calls
pub struct FlakyStore {
    inner: InMemoryStore,
    op: &'static str,
    remaining: AtomicU32,
    attempts: AtomicU32,
    error: fn() -> SubledgerError,
}

impl FlakyStore {
    /// Fail `op` with `error()` for its first `times` calls
    pub fn new(
        inner: InMemoryStore,
        op: &'static str,
        times: u32,
        error: fn() -> SubledgerError,
    ) -> Self {
        Self {
            inner,
            op,
            remaining: AtomicU32::new(times),
            attempts: AtomicU32::new(0),
            error,
        }
    }

    /// Fail `op` every time with a connection error
    pub fn down(inner: InMemoryStore, op: &'static str) -> Self {
        Self::new(inner, op, u32::MAX, || {
            SubledgerError::unavailable("connection refused")
        })
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    /// Calls made to the failing operation, successful or not
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if op != self.op {
            return Ok(());
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing { Err((self.error)()) } else { Ok(()) }
    }
}

#[async_trait]
impl SubscriptionStore for FlakyStore {
    async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.check("list_plans")?;
        self.inner.list_plans().await
    }

    async fn get_plan(&self, plan_id: i64) -> Result<Option<Plan>> {
        self.check("get_plan")?;
        self.inner.get_plan(plan_id).await
    }

    async fn get_subscription(&self, user_id: i64) -> Result<Option<Subscription>> {
        self.check("get_subscription")?;
        self.inner.get_subscription(user_id).await
    }

    async fn insert_subscription(&self, new: NewSubscription) -> Result<Subscription> {
        self.check("insert_subscription")?;
        self.inner.insert_subscription(new).await
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        self.check("update_subscription")?;
        self.inner.update_subscription(subscription).await
    }

    async fn cancel_subscription(&self, user_id: i64, now: DateTime<Utc>) -> Result<Subscription> {
        self.check("cancel_subscription")?;
        self.inner.cancel_subscription(user_id, now).await
    }

    async fn find_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        self.check("find_due_for_expiry")?;
        self.inner.find_due_for_expiry(now).await
    }

    async fn mark_expired(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<bool> {
        self.check("mark_expired")?;
        self.inner.mark_expired(subscription_id, now).await
    }

    async fn insert_user(&self, new: NewUser) -> Result<User> {
        self.check("insert_user")?;
        self.inner.insert_user(new).await
    }

    async fn ping(&self) -> Result<()> {
        self.check("ping")?;
        self.inner.ping().await
    }
}

// =============================================================================
// UnreachableCache
// =============================================================================

/// Cache whose every call fails as if the server were down
#[derive(Default)]
pub struct UnreachableCache {
    calls: AtomicU32,
}

impl UnreachableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SubledgerError::cache("connection refused"))
    }
}

#[async_trait]
impl Cache for UnreachableCache {
    async fn get_bytes(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        self.fail()
    }

    async fn set_bytes(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        self.fail()
    }

    async fn clear(&self) -> Result<()> {
        self.fail()
    }

    async fn ping(&self) -> Result<()> {
        self.fail()
    }

    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}

// =============================================================================
// RecordingCache
// =============================================================================

/// [`InMemoryCache`] wrapper that records the TTL passed with each write
pub struct RecordingCache {
    inner: InMemoryCache,
    ttls: Mutex<HashMap<String, Option<Duration>>>,
}

impl Default for RecordingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCache::new(1_000),
            ttls: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &InMemoryCache {
        &self.inner
    }

    /// TTL passed with the last write to `key`; `None` if never written
    pub fn ttl_for(&self, key: &str) -> Option<Option<Duration>> {
        self.ttls.lock().ok().and_then(|ttls| ttls.get(key).copied())
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_bytes(key).await
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        if let Ok(mut ttls) = self.ttls.lock() {
            ttls.insert(key.to_string(), ttl);
        }
        self.inner.set_bytes(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_store_recovers_after_budget() {
        let store = FlakyStore::new(InMemoryStore::new(), "list_plans", 2, || {
            SubledgerError::unavailable("blip")
        });

        assert!(store.list_plans().await.is_err());
        assert!(store.list_plans().await.is_err());
        assert!(store.list_plans().await.is_ok());
        assert_eq!(store.attempts(), 3);
        assert!(store.get_plan(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_counting_store_counts_per_op() {
        let store = CountingStore::new(InMemoryStore::new());
        store.list_plans().await.unwrap();
        store.list_plans().await.unwrap();
        store.get_subscription(1).await.unwrap();

        assert_eq!(store.calls("list_plans"), 2);
        assert_eq!(store.calls("get_subscription"), 1);
        assert_eq!(store.calls("get_plan"), 0);
    }

    #[tokio::test]
    async fn test_unreachable_cache_counts_failures() {
        let cache = UnreachableCache::new();
        assert!(cache.get_bytes("k").await.is_err());
        assert!(cache.ping().await.is_err());
        assert_eq!(cache.calls(), 2);
    }
}
