//! Postgres connection, configuration and schema.
//!
//! [`DatabaseConfig`] is always available so configuration can be parsed
//! without the `database` feature; connecting and migrating need it.

pub mod config;
#[cfg(feature = "database")]
mod connection;
#[cfg(feature = "database")]
mod migration;
#[cfg(feature = "database")]
mod migrations;

pub use config::{DatabaseConfig, redact_database_url};
#[cfg(feature = "database")]
pub use connection::connect;
#[cfg(feature = "database")]
pub use migration::run_migrations;
#[cfg(feature = "database")]
pub use migrations::Migrator;
#[cfg(feature = "database")]
pub use sea_orm;
