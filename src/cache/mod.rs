//! Redis cache adapter
//!
//! A generic, JSON-serializing object cache over Redis plus the connection
//! bootstrap. Orders and idempotency entries share this through the
//! [`ObjectCache`] port; callers treat cache failures as non-fatal.

pub mod rate_limit;

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, IntoConnectionInfo};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::config::RedisConfig;
use crate::core::error::{ServiceError, ServiceResult};

pub use rate_limit::{RateLimiter, RedisRateLimiter};

/// TTL-bounded typed cache port.
#[async_trait]
pub trait ObjectCache<T>: Send + Sync {
    async fn get(&self, id: &str) -> ServiceResult<Option<T>>;
    async fn set(&self, id: &str, value: &T, ttl: Duration) -> ServiceResult<()>;
    /// Returns `true` when the value was inserted, `false` when the key
    /// already held an entry.
    async fn set_if_absent(&self, id: &str, value: &T, ttl: Duration) -> ServiceResult<bool>;
    async fn delete(&self, id: &str) -> ServiceResult<()>;
}

/// Connects to Redis and wraps the client in a reconnecting manager.
pub async fn connect(config: &RedisConfig) -> anyhow::Result<ConnectionManager> {
    let mut info = config.url.as_str().into_connection_info()?;
    if !config.password.is_empty() {
        info.redis.password = Some(config.password.clone());
    }
    info.redis.db = config.db;

    let client = Client::open(info)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}

/// JSON-serializing cache under a key prefix.
#[derive(Clone)]
pub struct RedisCache<T> {
    conn: ConnectionManager,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RedisCache<T> {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
            _marker: PhantomData,
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[async_trait]
impl<T> ObjectCache<T> for RedisCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> ServiceResult<Option<T>> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(self.key(id)).await.map_err(cache_error)?;
        match data {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| ServiceError::internal(format!("cache: decode failed: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: &str, value: &T, ttl: Duration) -> ServiceResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| ServiceError::internal(format!("cache: encode failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(id), json, ttl.as_secs())
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn set_if_absent(&self, id: &str, value: &T, ttl: Duration) -> ServiceResult<bool> {
        let json = serde_json::to_string(value)
            .map_err(|e| ServiceError::internal(format!("cache: encode failed: {e}")))?;
        let mut conn = self.conn.clone();
        // Single SET .. NX EX round trip keeps the claim and its expiry atomic.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.key(id))
            .arg(json)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.key(id)).await.map_err(cache_error)?;
        Ok(())
    }
}

fn cache_error(err: redis::RedisError) -> ServiceError {
    ServiceError::internal(format!("redis: {err}"))
}
