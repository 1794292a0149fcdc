//! Idempotency coordinator
//!
//! Collapses duplicate submissions behind a client-supplied key. The first
//! request claims the key and does the work; concurrent duplicates wait for
//! the stored outcome; later duplicates get it straight from the cache until
//! the TTL expires.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::cache::ObjectCache;
use crate::core::error::{ServiceError, ServiceResult};

/// Lifecycle of one idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyStatus {
    Processing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyEntry<T> {
    pub status: IdempotencyStatus,
    pub payload_hash: String,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

pub struct IdempotencyService<T> {
    cache: Arc<dyn ObjectCache<IdempotencyEntry<T>>>,
    ttl: Duration,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl<T> IdempotencyService<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: Arc<dyn ObjectCache<IdempotencyEntry<T>>>,
        ttl: Duration,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            ttl,
            poll_interval,
            poll_timeout,
        }
    }

    /// Claims `key` for the calling request.
    ///
    /// `Ok(None)` means the caller owns the work. `Ok(Some(result))` is the
    /// stored outcome of an earlier request with the same key and payload.
    pub async fn claim(&self, key: &str, payload_hash: &str) -> ServiceResult<Option<T>> {
        let entry = IdempotencyEntry {
            status: IdempotencyStatus::Processing,
            payload_hash: payload_hash.to_string(),
            result: None,
        };
        let claimed = self
            .cache
            .set_if_absent(key, &entry, self.ttl)
            .await
            .map_err(|e| ServiceError::internal(format!("idempotency claim failed: {e}")))?;

        if claimed {
            return Ok(None);
        }

        self.wait_for_completion(key, payload_hash).await
    }

    /// Records the outcome so duplicates observe it until the TTL expires.
    /// Failures are swallowed: a vanished entry just makes a later duplicate
    /// fail with Conflict and retry.
    pub async fn complete(&self, key: &str, payload_hash: &str, result: &T) {
        let entry = IdempotencyEntry {
            status: IdempotencyStatus::Completed,
            payload_hash: payload_hash.to_string(),
            result: Some(result.clone()),
        };
        if let Err(err) = self.cache.set(key, &entry, self.ttl).await {
            tracing::error!(
                error = %err,
                idempotency_key = %key,
                "idempotency: complete failed"
            );
        }
    }

    /// Drops the claim after a failure so the client can retry with the same
    /// key. Failures are swallowed for the same reason as in `complete`.
    pub async fn release(&self, key: &str) {
        if let Err(err) = self.cache.delete(key).await {
            tracing::error!(
                error = %err,
                idempotency_key = %key,
                "idempotency: release failed"
            );
        }
    }

    async fn check_entry(&self, key: &str, payload_hash: &str) -> ServiceResult<Option<T>> {
        let entry = self
            .cache
            .get(key)
            .await
            .map_err(|e| ServiceError::internal(format!("idempotency check failed: {e}")))?;

        let Some(entry) = entry else {
            // The in-flight request released the key after failing.
            return Err(ServiceError::conflict(
                "previous request failed, retry with the same key",
            ));
        };

        if entry.payload_hash != payload_hash {
            return Err(ServiceError::unprocessable_entity(
                "idempotency key already used with a different payload",
            ));
        }

        if entry.status == IdempotencyStatus::Completed {
            return Ok(entry.result);
        }

        Ok(None)
    }

    async fn wait_for_completion(&self, key: &str, payload_hash: &str) -> ServiceResult<Option<T>> {
        // Check immediately so an already-completed entry returns without
        // waiting out a poll interval.
        if let Some(result) = self.check_entry(key, payload_hash).await? {
            return Ok(Some(result));
        }

        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let next_tick = Instant::now() + self.poll_interval;
            if next_tick > deadline {
                return Err(ServiceError::conflict(
                    "idempotency key still being processed, timed out",
                ));
            }
            tokio::time::sleep_until(next_tick).await;

            if let Some(result) = self.check_entry(key, payload_hash).await? {
                return Ok(Some(result));
            }
        }
    }
}
