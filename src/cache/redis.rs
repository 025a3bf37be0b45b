use crate::error::{Result, SubledgerError};
use crate::traits::cache::Cache;
use async_trait::async_trait;
use std::time::Duration;

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis cache implementation
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    default_ttl: Duration,
    op_timeout: Duration,
}

impl RedisCache {
    /// Create a new Redis cache from a connection URL
    ///
    /// Does not connect; a Redis that is down at startup only degrades reads.
    pub fn new(url: &str, default_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            SubledgerError::configuration(format!("Invalid Redis URL: {}", e))
        })?;

        Ok(Self {
            client,
            default_ttl,
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Bound each command (connect included) to `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    async fn run<T, F, Fut>(&self, command: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(redis::aio::MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let work = async {
            let conn = self.client.get_multiplexed_async_connection().await?;
            f(conn).await
        };

        match tokio::time::timeout(self.op_timeout, work).await {
            Ok(result) => result.map_err(SubledgerError::from),
            Err(_) => Err(SubledgerError::cache(format!(
                "Redis {} timed out after {:?}",
                command, self.op_timeout
            ))),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run("GET", |mut conn| async move {
            redis::cmd("GET")
                .arg(key)
                .query_async::<Option<Vec<u8>>>(&mut conn)
                .await
        })
        .await
    }

    async fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        // SETEX rejects 0, so sub-second TTLs round up to one second
        let ttl_secs = ttl.unwrap_or(self.default_ttl).as_secs().max(1);

        self.run("SETEX", |mut conn| async move {
            redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(value)
                .query_async::<()>(&mut conn)
                .await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.run("DEL", |mut conn| async move {
            redis::cmd("DEL").arg(key).query_async::<()>(&mut conn).await
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.run("FLUSHDB", |mut conn| async move {
            redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.run("PING", |mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
