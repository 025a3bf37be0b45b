//! subledger - subscription management backend
//!
//! Users register, browse a plan catalog and hold at most one subscription
//! each, which they can create, move to another plan or cancel. A background
//! sweeper expires subscriptions whose end date has passed.
//!
//! # Layers
//!
//! - **Store**: the source of truth ([`SubscriptionStore`]), Postgres via
//!   SeaORM or in memory
//! - **Cache**: cache-aside reads in front of the store ([`Cache`]), Redis or
//!   moka, never authoritative
//! - **Access**: [`DataAccess`] combines the two and applies [`RetryPolicy`]
//! - **Lifecycle**: [`SubscriptionService`] and [`ExpirySweeper`]
//! - **HTTP**: axum routes over an [`AppContext`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subledger::{App, AppContext, ConfigBuilder, DataAccess, SessionIssuer, SessionVerifier};
//! use subledger::{cache, store::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> subledger::Result<()> {
//!     let config = ConfigBuilder::new().from_env().build()?;
//!     subledger::init_tracing_with_config(&config);
//!
//!     let access = DataAccess::new(Arc::new(InMemoryStore::new()), cache::from_config(&config.cache)?);
//!     let context = AppContext::builder()
//!         .with_access(access)
//!         .with_sessions(
//!             SessionIssuer::from_config(&config.auth)?,
//!             SessionVerifier::from_config(&config.auth)?,
//!         )
//!         .build()?;
//!
//!     App::new(config, context).serve(None).await
//! }
//! ```

pub mod access;
mod app;
pub mod auth;
pub mod cache;
mod config;
mod core;
pub mod database;
mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
mod middleware;
pub mod models;
pub mod retry;
pub mod store;
pub mod testing;
pub mod traits;
pub mod users;
mod utils;

// Re-exports for public API
pub use access::DataAccess;
pub use app::{AppContext, AppContextBuilder};
pub use auth::{AuthUser, PasswordHasher, SessionIssuer, SessionVerifier};
pub use config::{AuthConfig, Config, ConfigBuilder, LoggingConfig, ServerConfig, SweepConfig};
pub use core::App;
pub use error::{Result, SubledgerError};
pub use health::{ComponentHealth, HealthCheck, HealthChecker, HealthStatus};
pub use http::{DataResponse, RouteModule, TokenResponse};
pub use lifecycle::{ExpirySweeper, SubscriptionService, SweepReport, SweeperHandle};
pub use models::{Plan, Subscription, SubscriptionStatus, User};
pub use retry::{Backoff, Criticality, RetryPolicy};
pub use store::SubscriptionStore;
pub use traits::cache::{Cache, CacheExt};
pub use users::UserService;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with sensible defaults
///
/// # Environment Variables
///
/// - `RUST_LOG`: log filter (e.g. "info", "subledger=debug")
/// - `SUBLEDGER_LOG_JSON`: "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("SUBLEDGER_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    install(env_filter, json_logs);
}

/// Initialize tracing from the logging section of `config`
///
/// `RUST_LOG` still wins over the configured level when set.
pub fn init_tracing_with_config(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    install(env_filter, config.logging.json);
}

fn install(env_filter: EnvFilter, json: bool) {
    // try_init: a second call (tests, embedding) keeps the first subscriber
    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing already initialized");
    }
}
