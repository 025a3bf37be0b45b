//! Test fixtures and builders for plans, subscriptions and registrations

use crate::models::{Plan, Subscription, SubscriptionStatus};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Random-ish values for test data
pub mod fake {
    use uuid::Uuid;

    /// Generate a fake display name
    pub fn name() -> String {
        format!("Test User {}", &Uuid::new_v4().simple().to_string()[..8])
    }

    /// Generate a password long enough for any hasher
    pub fn password() -> String {
        format!("pw-{}", Uuid::new_v4().simple())
    }

    /// Generate a random integer between min and max
    pub fn int(min: i64, max: i64) -> i64 {
        fastrand::i64(min..=max)
    }

    /// Generate a random price with two decimal places
    pub fn price() -> f64 {
        fastrand::u32(100..10_000) as f64 / 100.0
    }
}

fn catalog_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A catalog plan lasting `duration_days`
pub fn plan(id: i64, duration_days: i32) -> Plan {
    Plan {
        id,
        name: format!("plan-{}", id),
        price: 9.99,
        features: vec!["basic".to_string()],
        duration_days,
        created_at: catalog_epoch(),
        updated_at: catalog_epoch(),
    }
}

/// The catalog used by the HTTP and lifecycle integration tests
pub fn standard_plans() -> Vec<Plan> {
    vec![
        PlanBuilder::new(1).name("Basic").price(9.99).duration_days(30).build(),
        PlanBuilder::new(2)
            .name("Pro")
            .price(19.99)
            .duration_days(30)
            .feature("priority-support")
            .build(),
        PlanBuilder::new(3)
            .name("Annual")
            .price(199.0)
            .duration_days(365)
            .build(),
    ]
}

/// Builder for catalog plans
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    pub fn new(id: i64) -> Self {
        Self { plan: plan(id, 30) }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.plan.name = name.into();
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.plan.price = price;
        self
    }

    pub fn duration_days(mut self, days: i32) -> Self {
        self.plan.duration_days = days;
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.plan.features.push(feature.into());
        self
    }

    pub fn build(self) -> Plan {
        self.plan
    }
}

/// An active subscription on plan 1 that ends at `end_date`
pub fn subscription_ending(id: i64, user_id: i64, end_date: DateTime<Utc>) -> Subscription {
    let start = end_date - chrono::Duration::days(30);
    Subscription {
        id,
        user_id,
        plan_id: 1,
        status: SubscriptionStatus::Active,
        start_date: start,
        end_date,
        created_at: start,
        updated_at: start,
    }
}

/// Registration request body
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub name: String,
    pub password: String,
}

impl Registration {
    pub fn generate() -> Self {
        Self {
            name: fake::name(),
            password: fake::password(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_builder() {
        let plan = PlanBuilder::new(5)
            .name("Team")
            .duration_days(90)
            .feature("sso")
            .build();

        assert_eq!(plan.id, 5);
        assert_eq!(plan.name, "Team");
        assert_eq!(plan.duration_days, 90);
        assert_eq!(plan.features, vec!["basic".to_string(), "sso".to_string()]);
    }

    #[test]
    fn test_standard_plans_have_unique_ids() {
        let plans = standard_plans();
        let mut ids: Vec<i64> = plans.iter().map(|p| p.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), plans.len());
    }

    #[test]
    fn test_fake_values() {
        assert_ne!(fake::password(), fake::password());
        let n = fake::int(1, 3);
        assert!((1..=3).contains(&n));
        assert!(fake::price() >= 1.0);
    }

    #[test]
    fn test_subscription_ending() {
        let end = Utc::now();
        let sub = subscription_ending(1, 7, end);
        assert_eq!(sub.end_date, end);
        assert!(sub.start_date < end);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }
}
