//! Request admission counter
//!
//! Fixed-window counter per key, evaluated atomically in Redis: the first
//! request of a window creates the key with a TTL, every request increments
//! it. The window is anchored at the first request and resets when the key
//! expires.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;

use crate::core::error::{ServiceError, ServiceResult};

const RATE_LIMIT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Admission port for mutating endpoints.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Whether the caller identified by `key` is still within `limit` for the
    /// current window.
    async fn allow(&self, key: &str, limit: u32, window: Duration) -> ServiceResult<bool>;
}

pub struct RedisRateLimiter {
    conn: ConnectionManager,
    script: Script,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            script: Script::new(RATE_LIMIT_SCRIPT),
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn allow(&self, key: &str, limit: u32, window: Duration) -> ServiceResult<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = self
            .script
            .key(format!("ratelimit:{key}"))
            .arg(window.as_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| ServiceError::internal(format!("redis: {e}")))?;
        Ok(count <= i64::from(limit))
    }
}
