//! Testing utilities for subledger
//!
//! - Alba-style HTTP scenarios driven through the router without a server
//! - Fixtures for plans, subscriptions and registrations
//! - Store and cache doubles for the cache-aside and retry paths
//!
//! # Example
//!
//! ```rust,ignore
//! use subledger::testing::{self, fixtures};
//!
//! #[tokio::test]
//! async fn lists_plans() {
//!     let app = testing::TestApp::with_plans(fixtures::standard_plans()).await;
//!
//!     let plans: Vec<subledger::Plan> = testing::get(app.router(), "/api/plans")
//!         .execute()
//!         .await
//!         .assert_ok()
//!         .data()
//!         .await;
//!     assert_eq!(plans.len(), 3);
//! }
//! ```

pub mod doubles;
pub mod fixtures;
mod harness;
mod scenario;

pub use fixtures::fake;
pub use harness::TestApp;
pub use scenario::{Scenario, ScenarioAssert, delete, get, post, put};
