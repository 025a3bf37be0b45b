//! Subscription lifecycle: create, upgrade/downgrade, cancel and expire.
//!
//! ```text
//!            create            update (any plan)
//!   (none) ─────────▶ ACTIVE ◀───────────────┐
//!                       │  │                  │
//!              cancel   │  │ end_date <= now  │
//!                       ▼  ▼                  │
//!            CANCELLED    EXPIRED ────────────┘
//!            (row gone)
//! ```
//!
//! [`SubscriptionService`] handles the request-driven transitions and
//! [`ExpirySweeper`] the time-driven one.

mod service;
mod sweeper;

pub use service::SubscriptionService;
pub use sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
