use crate::error::{Result, SubledgerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Plan;

/// Cache TTL used when a subscription has already reached its end date
pub const EXPIRED_ENTRY_TTL: Duration = Duration::from_secs(60 * 60);

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = SubledgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "CANCELLED" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(SubledgerError::internal(format!(
                "Unknown subscription status: {}",
                other
            ))),
        }
    }
}

/// A user's subscription to a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// How long this subscription may sit in the cache.
    ///
    /// The time left until `end_date`, or [`EXPIRED_ENTRY_TTL`] once that has
    /// passed.
    pub fn cache_ttl(&self, now: DateTime<Utc>) -> Duration {
        (self.end_date - now)
            .to_std()
            .ok()
            .filter(|remaining| !remaining.is_zero())
            .unwrap_or(EXPIRED_ENTRY_TTL)
    }

    /// Active and past its end date
    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date <= now
    }

    /// Point this subscription at `plan` for a fresh period starting at `now`.
    ///
    /// Any time left on the previous period is discarded.
    pub fn restart_on(&mut self, plan: &Plan, now: DateTime<Utc>) -> Result<()> {
        let (start, end) = period_for(plan, now)?;
        self.plan_id = plan.id;
        self.status = SubscriptionStatus::Active;
        self.start_date = start;
        self.end_date = end;
        self.updated_at = now;
        Ok(())
    }
}

/// Fields needed to insert a subscription; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub user_id: i64,
    pub plan_id: i64,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewSubscription {
    /// An active subscription to `plan` starting at `now`
    pub fn active(user_id: i64, plan: &Plan, now: DateTime<Utc>) -> Result<Self> {
        let (start_date, end_date) = period_for(plan, now)?;
        Ok(Self {
            user_id,
            plan_id: plan.id,
            status: SubscriptionStatus::Active,
            start_date,
            end_date,
        })
    }
}

/// `(now, now + plan.duration_days)`
pub fn period_for(plan: &Plan, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if plan.duration_days < 0 {
        return Err(SubledgerError::internal(format!(
            "Plan {} has negative duration {}",
            plan.id, plan.duration_days
        )));
    }
    let end = now
        .checked_add_signed(chrono::Duration::days(i64::from(plan.duration_days)))
        .ok_or_else(|| {
            SubledgerError::internal(format!("Plan {} duration overflows the calendar", plan.id))
        })?;
    Ok((now, end))
}
