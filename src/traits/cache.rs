//! Cache trait for key-value storage
//!
//! Abstracts the cache backend so the data access layer can run against
//! Redis in production, moka in development, or a test double.

use crate::error::{Result, SubledgerError};
use async_trait::async_trait;
use std::time::Duration;

/// Cache trait for key-value storage with optional TTL
///
/// Values travel as JSON bytes so the trait stays object-safe; use
/// [`CacheExt`] for typed access.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value from the cache as JSON bytes
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value in the cache
    ///
    /// `Some(ttl)` expires the entry after that duration; `None` applies the
    /// backend's default TTL.
    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a value from the cache. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Clear all values from the cache
    async fn clear(&self) -> Result<()>;

    /// Round-trip to the backend to check it is reachable
    async fn ping(&self) -> Result<()>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for type-safe cache operations
pub trait CacheExt: Cache {
    /// Get a value from the cache
    ///
    /// A payload that no longer matches `T` is reported as an internal error
    /// so callers can treat it like a miss.
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.get_bytes(key).await? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Set a value in the cache
    async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        self.set_bytes(key, encode(value)?, ttl).await
    }
}

// Blanket implementation - all Cache implementations get CacheExt for free
impl<T: Cache + ?Sized> CacheExt for T {}

/// Serialize a value into the cache wire format
pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| SubledgerError::internal(format!("Failed to serialize cache value: {}", e)))
}

/// Deserialize a cached payload
pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| SubledgerError::internal(format!("Failed to deserialize cache value: {}", e)))
}
