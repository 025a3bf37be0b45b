//! Cache backends.
//!
//! In-memory (moka) by default, Redis with the `cache-redis` feature, and a
//! no-op backend for running without a cache.

mod config;
mod in_memory;
pub mod keys;
mod noop;

#[cfg(feature = "cache-redis")]
mod redis;

pub use config::{CacheBackend, CacheConfig};
pub use in_memory::InMemoryCache;
pub use noop::NoOpCache;

#[cfg(feature = "cache-redis")]
pub use redis::RedisCache;

use crate::error::Result;
use crate::traits::cache::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured cache backend
pub fn from_config(config: &CacheConfig) -> Result<Arc<dyn Cache>> {
    let default_ttl = Duration::from_secs(config.default_ttl_seconds);

    let cache: Arc<dyn Cache> = match config.backend {
        CacheBackend::InMemory => Arc::new(InMemoryCache::with_ttl(config.max_entries, default_ttl)),
        #[cfg(feature = "cache-redis")]
        CacheBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                crate::error::SubledgerError::configuration("Redis backend requires a URL")
            })?;
            Arc::new(RedisCache::new(url, default_ttl)?)
        }
        CacheBackend::NoOp => Arc::new(NoOpCache),
    };

    tracing::info!(backend = cache.backend_name(), "Cache initialized");
    Ok(cache)
}
