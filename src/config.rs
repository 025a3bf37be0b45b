use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::database::DatabaseConfig;
use crate::error::{Result, SubledgerError};
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Main configuration for the subledger service
///
/// Built once at startup and handed to constructors. Nothing below this
/// layer reads the process environment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// `None` runs against the in-memory store
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes (default: 1MB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Session token settings
#[derive(Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify session tokens. Required.
    #[serde(default, skip_serializing)]
    pub jwt_secret: Option<String>,
    /// Lifetime of issued tokens, also used as the token cache TTL
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

/// Expiry sweep scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_token_ttl_seconds() -> u64 {
    24 * 60 * 60
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval_seconds() -> u64 {
    60 * 60
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl AuthConfig {
    /// The signing secret, or a configuration error when it is unset or blank
    pub fn secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SubledgerError::configuration("JWT_SECRET is not set"))
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.config.server.max_body_size = max_body_size;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = Some(database);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.jwt_secret = Some(secret.into());
        self
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.config.auth.token_ttl_seconds = ttl.as_secs();
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep.interval_seconds = interval.as_secs();
        self
    }

    pub fn with_sweep_enabled(mut self, enabled: bool) -> Self {
        self.config.sweep.enabled = enabled;
        self
    }

    /// Load configuration from environment variables with SUBLEDGER_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(host) = get_env_with_prefix("HOST") {
            self.config.server.host = host;
        }
        if let Some(port) = parse_env_with_prefix("PORT") {
            self.config.server.port = port;
        }
        if let Some(size) = parse_env_with_prefix("MAX_BODY_SIZE") {
            self.config.server.max_body_size = size;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = parse_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }

        if let Some(database) = DatabaseConfig::from_env() {
            self.config.database = Some(database);
        }
        self.config.cache = CacheConfig::from_env();

        if let Some(secret) = get_env_with_prefix("JWT_SECRET") {
            self.config.auth.jwt_secret = Some(secret);
        }
        if let Some(ttl) = parse_env_with_prefix("TOKEN_TTL_SECONDS") {
            self.config.auth.token_ttl_seconds = ttl;
        }

        if let Some(enabled) = parse_env_with_prefix("SWEEP_ENABLED") {
            self.config.sweep.enabled = enabled;
        }
        if let Some(interval) = parse_env_with_prefix("SWEEP_INTERVAL_SECONDS") {
            self.config.sweep.interval_seconds = interval;
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid listen address or log
    /// level, a zero port, body size, token TTL or sweep interval, a Redis
    /// backend without a URL, or a missing session signing secret.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        config.server.addr().map_err(|e| {
            SubledgerError::configuration(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(SubledgerError::configuration(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if config.server.port == 0 {
            return Err(SubledgerError::configuration("Server port must be greater than 0"));
        }

        if config.server.max_body_size == 0 {
            return Err(SubledgerError::configuration(
                "Maximum body size must be greater than 0",
            ));
        }

        config.auth.secret()?;

        if config.auth.token_ttl_seconds == 0 {
            return Err(SubledgerError::configuration(
                "Token TTL must be greater than 0",
            ));
        }

        if config.sweep.enabled && config.sweep.interval_seconds == 0 {
            return Err(SubledgerError::configuration(
                "Sweep interval must be greater than 0 when enabled",
            ));
        }

        #[cfg(feature = "cache-redis")]
        {
            if config.cache.backend == crate::cache::CacheBackend::Redis
                && config.cache.redis_url.is_none()
            {
                return Err(SubledgerError::configuration(
                    "Redis cache backend selected but no CACHE_REDIS_URL or REDIS_ADDR given",
                ));
            }
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = ConfigBuilder::new().build().unwrap_err();
        assert!(matches!(err, SubledgerError::Configuration(_)));
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        let err = ConfigBuilder::new().with_jwt_secret("   ").build().unwrap_err();
        assert!(matches!(err, SubledgerError::Configuration(_)));
    }

    #[test]
    fn test_defaults_with_secret() {
        let config = ConfigBuilder::new().with_jwt_secret("s3cret").build().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.sweep.interval(), Duration::from_secs(3_600));
        assert!(config.sweep.enabled);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_invalid_log_level() {
        let err = ConfigBuilder::new()
            .with_jwt_secret("s3cret")
            .with_log_level("chatty")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_zero_sweep_interval_rejected_only_when_enabled() {
        let err = ConfigBuilder::new()
            .with_jwt_secret("s3cret")
            .with_sweep_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, SubledgerError::Configuration(_)));

        ConfigBuilder::new()
            .with_jwt_secret("s3cret")
            .with_sweep_interval(Duration::ZERO)
            .with_sweep_enabled(false)
            .build()
            .unwrap();
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let config = ConfigBuilder::new().with_jwt_secret("top-secret").build().unwrap();
        let rendered = format!("{:?}", config.auth);
        assert!(!rendered.contains("top-secret"));
    }
}
