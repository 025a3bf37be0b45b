use super::config::{DatabaseConfig, redact_database_url};
use crate::error::{Result, SubledgerError};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

/// Open a pooled SeaORM connection from config
///
/// A failure to reach the server is reported as `Unavailable`.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .idle_timeout(Duration::from_secs(config.idle_timeout))
        .sqlx_logging(false);

    let conn = Database::connect(opt).await.map_err(|e| {
        SubledgerError::unavailable(format!(
            "Failed to connect to database {}: {}",
            redact_database_url(&config.url),
            e
        ))
    })?;

    tracing::info!(
        url = %redact_database_url(&config.url),
        max_connections = config.max_connections,
        "Database connected"
    );

    Ok(conn)
}
