//! Lifecycle scenarios spanning the HTTP surface, the cache and the sweeper

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;
use subledger::cache::keys;
use subledger::store::{InMemoryStore, SubscriptionStore};
use subledger::testing::doubles::UnreachableCache;
use subledger::testing::fixtures::{self, subscription_ending};
use subledger::testing::{self as t, TestApp};
use subledger::{Cache, Subscription, SubscriptionStatus, SweepReport};

async fn subscribe(app: &TestApp, user_id: i64, plan_id: i64) -> Subscription {
    t::post(app.router(), "/api/subs/subscription")
        .bearer_token(&app.token_for(user_id))
        .json_body(&json!({ "planId": plan_id }))
        .execute()
        .await
        .assert_ok()
        .data()
        .await
}

#[tokio::test]
async fn test_sweep_expires_only_due_subscriptions() {
    let app = TestApp::with_plans(fixtures::standard_plans()).await;
    let current = subscribe(&app, 1, 1).await;
    app.store()
        .put_subscription(subscription_ending(100, 2, Utc::now() - ChronoDuration::days(2)))
        .await;

    let report = app.sweeper().run_once(Utc::now()).await.unwrap();
    assert_eq!(report, SweepReport { scanned: 1, expired: 1, failed: 0 });

    let still_active = app.store().get_subscription(1).await.unwrap().unwrap();
    assert_eq!(still_active.id, current.id);
    assert_eq!(still_active.status, SubscriptionStatus::Active);

    let expired = app.store().get_subscription(2).await.unwrap().unwrap();
    assert_eq!(expired.status, SubscriptionStatus::Expired);

    // A second pass has nothing left to do
    let again = app.sweeper().run_once(Utc::now()).await.unwrap();
    assert_eq!(again, SweepReport::default());
}

#[tokio::test]
async fn test_sweep_replaces_cached_active_entry() {
    let app = TestApp::with_plans(fixtures::standard_plans()).await;
    app.store()
        .put_subscription(subscription_ending(100, 2, Utc::now() - ChronoDuration::minutes(1)))
        .await;
    let token = app.token_for(2);

    // Warm the cache while the row is still active
    let before: Subscription = t::get(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok()
        .data()
        .await;
    assert_eq!(before.status, SubscriptionStatus::Active);

    app.sweeper().run_once(Utc::now()).await.unwrap();

    let after: Subscription = t::get(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok()
        .data()
        .await;
    assert_eq!(after.status, SubscriptionStatus::Expired);
}

#[tokio::test]
async fn test_expired_subscription_renews_through_update() {
    let app = TestApp::with_plans(fixtures::standard_plans()).await;
    let old_end = Utc::now() - ChronoDuration::days(3);
    app.store()
        .put_subscription(subscription_ending(100, 2, old_end))
        .await;
    app.sweeper().run_once(Utc::now()).await.unwrap();

    let renewed: Subscription = t::put(app.router(), "/api/subs/subscription")
        .bearer_token(&app.token_for(2))
        .json_body(&json!({ "newPlanId": 2 }))
        .execute()
        .await
        .assert_ok()
        .data()
        .await;

    assert_eq!(renewed.id, 100);
    assert_eq!(renewed.plan_id, 2);
    assert_eq!(renewed.status, SubscriptionStatus::Active);
    assert!(renewed.end_date > Utc::now() + ChronoDuration::days(29));
}

#[tokio::test]
async fn test_downgrade_discards_remaining_time() {
    let app = TestApp::with_plans(fixtures::standard_plans()).await;
    let annual = subscribe(&app, 3, 3).await;

    let monthly: Subscription = t::put(app.router(), "/api/subs/subscription")
        .bearer_token(&app.token_for(3))
        .json_body(&json!({ "newPlanId": 1 }))
        .execute()
        .await
        .assert_ok()
        .data()
        .await;

    assert!(monthly.end_date < annual.end_date);
    assert!(monthly.start_date >= annual.start_date);
    assert_eq!((monthly.end_date - monthly.start_date).num_days(), 30);
}

#[tokio::test]
async fn test_cancel_never_serves_stale_cache() {
    let app = TestApp::with_plans(fixtures::standard_plans()).await;
    subscribe(&app, 4, 1).await;
    let token = app.token_for(4);

    t::get(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();

    t::delete(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();

    assert!(
        app.access()
            .cache()
            .get_bytes(&keys::subscription(4))
            .await
            .unwrap()
            .is_none()
    );
    t::get(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_not_found();

    // The user may subscribe again after cancelling
    let again = subscribe(&app, 4, 2).await;
    assert_eq!(again.plan_id, 2);
}

#[tokio::test]
async fn test_everything_works_with_cache_down() {
    let seed = InMemoryStore::with_plans(fixtures::standard_plans()).await;
    let cache = Arc::new(UnreachableCache::new());
    let app = TestApp::with_backends(seed.clone(), Arc::new(seed), cache.clone());
    let token = app.token_for(9);

    t::post(app.router(), "/api/user/register")
        .json_body(&fixtures::Registration::generate())
        .execute()
        .await
        .assert_ok();

    let created = subscribe(&app, 9, 1).await;
    let updated: Subscription = t::put(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .json_body(&json!({ "newPlanId": 2 }))
        .execute()
        .await
        .assert_ok()
        .data()
        .await;
    assert_eq!(updated.id, created.id);

    let fetched: Subscription = t::get(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok()
        .data()
        .await;
    assert_eq!(fetched.plan_id, 2);

    t::delete(app.router(), "/api/subs/subscription")
        .bearer_token(&token)
        .execute()
        .await
        .assert_ok();

    assert!(cache.calls() > 0);
}
