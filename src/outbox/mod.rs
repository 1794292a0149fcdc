//! Transactional outbox relay
//!
//! State changes that must reach the bus are inserted into the `outbox`
//! collection inside the same transaction as the change itself. This
//! background loop drains the collection on a fixed tick and publishes each
//! row, deleting it only after the broker acknowledged. Delivery is therefore
//! at-least-once; downstream consumers must tolerate repeats.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::broker::EventPublisher;
use crate::core::error::ServiceResult;
use crate::db::StoreSession;

/// One store-and-forward row.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    /// Empty until the storage layer assigns an id.
    pub id: String,
    pub event_name: String,
    pub entity_name: String,
    pub event_data: Vec<u8>,
}

/// Outbox persistence port.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts inside the caller's transaction.
    async fn insert(&self, entry: OutboxEntry, session: &mut StoreSession) -> ServiceResult<()>;

    /// Up to `limit` entries, oldest first.
    async fn fetch_pending(&self, limit: u32) -> ServiceResult<Vec<OutboxEntry>>;

    async fn delete(&self, id: &str) -> ServiceResult<()>;
}

/// Single in-process publisher loop. Horizontal scaling would need a lease on
/// outbox processing; one instance per deployment is assumed.
pub struct OutboxPublisher {
    store: Arc<dyn OutboxStore>,
    broker: Arc<dyn EventPublisher>,
    interval: Duration,
    batch_size: u32,
}

impl OutboxPublisher {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        broker: Arc<dyn EventPublisher>,
        interval: Duration,
        batch_size: u32,
    ) -> Self {
        Self {
            store,
            broker,
            interval,
            batch_size,
        }
    }

    /// Runs until the shutdown token fires.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Outbox publisher started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.process_batch().await,
            }
        }

        tracing::info!("Outbox publisher stopped");
    }

    async fn process_batch(&self) {
        let entries = match self.store.fetch_pending(self.batch_size).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    batch_size = self.batch_size,
                    "outbox: failed to fetch pending events"
                );
                return;
            }
        };

        for entry in entries {
            if let Err(err) = self
                .broker
                .publish_raw(&entry.event_name, &entry.entity_name, &entry.event_data)
                .await
            {
                tracing::error!(
                    error = %err,
                    event_id = %entry.id,
                    event_name = %entry.event_name,
                    "outbox: failed to publish event"
                );
                // Keep the row; the next tick retries it.
                continue;
            }

            tracing::debug!(
                event_id = %entry.id,
                event_name = %entry.event_name,
                "outbox: event published"
            );

            if let Err(err) = self.store.delete(&entry.id).await {
                // The row will be republished; downstream dedupes.
                tracing::error!(
                    error = %err,
                    event_id = %entry.id,
                    "outbox: failed to delete event after publish"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ServiceError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryOutbox {
        entries: Mutex<Vec<OutboxEntry>>,
        next_id: Mutex<u64>,
        fail_delete: Mutex<bool>,
    }

    impl MemoryOutbox {
        fn push(&self, event_name: &str) -> String {
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            let id = format!("{:024x}", *next_id);
            self.entries.lock().unwrap().push(OutboxEntry {
                id: id.clone(),
                event_name: event_name.to_string(),
                entity_name: "order".to_string(),
                event_data: br#"{"order_id":"o1"}"#.to_vec(),
            });
            id
        }

        fn ids(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|entry| entry.id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl OutboxStore for MemoryOutbox {
        async fn insert(
            &self,
            entry: OutboxEntry,
            _session: &mut StoreSession,
        ) -> ServiceResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        async fn fetch_pending(&self, limit: u32) -> ServiceResult<Vec<OutboxEntry>> {
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().take(limit as usize).cloned().collect())
        }

        async fn delete(&self, id: &str) -> ServiceResult<()> {
            if *self.fail_delete.lock().unwrap() {
                return Err(ServiceError::internal("delete failed"));
            }
            self.entries.lock().unwrap().retain(|entry| entry.id != id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        published: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingBroker {
        async fn publish_raw(
            &self,
            event_name: &str,
            _entity_name: &str,
            _payload: &[u8],
        ) -> ServiceResult<()> {
            if self.failing.lock().unwrap().contains(event_name) {
                return Err(ServiceError::internal("broker down"));
            }
            self.published.lock().unwrap().push(event_name.to_string());
            Ok(())
        }
    }

    fn publisher(
        store: &Arc<MemoryOutbox>,
        broker: &Arc<RecordingBroker>,
        batch_size: u32,
    ) -> OutboxPublisher {
        OutboxPublisher::new(
            Arc::clone(store) as Arc<dyn OutboxStore>,
            Arc::clone(broker) as Arc<dyn EventPublisher>,
            Duration::from_millis(500),
            batch_size,
        )
    }

    #[tokio::test]
    async fn publishes_in_insertion_order_and_deletes() {
        let store = Arc::new(MemoryOutbox::default());
        let broker = Arc::new(RecordingBroker::default());
        store.push("event.first");
        store.push("event.second");
        store.push("event.third");

        publisher(&store, &broker, 10).process_batch().await;

        assert_eq!(
            *broker.published.lock().unwrap(),
            vec!["event.first", "event.second", "event.third"]
        );
        assert!(store.ids().is_empty());
    }

    #[tokio::test]
    async fn failed_publish_keeps_entry_without_stalling_the_batch() {
        let store = Arc::new(MemoryOutbox::default());
        let broker = Arc::new(RecordingBroker::default());
        store.push("event.ok1");
        let kept = store.push("event.broken");
        store.push("event.ok2");
        broker
            .failing
            .lock()
            .unwrap()
            .insert("event.broken".to_string());

        publisher(&store, &broker, 10).process_batch().await;

        assert_eq!(
            *broker.published.lock().unwrap(),
            vec!["event.ok1", "event.ok2"]
        );
        assert_eq!(store.ids(), vec![kept.clone()]);

        // Broker recovers; the retained entry drains on the next tick.
        broker.failing.lock().unwrap().clear();
        publisher(&store, &broker, 10).process_batch().await;
        assert!(store.ids().is_empty());
    }

    #[tokio::test]
    async fn delete_failure_is_tolerated_and_entry_republished() {
        let store = Arc::new(MemoryOutbox::default());
        let broker = Arc::new(RecordingBroker::default());
        store.push("event.sticky");
        *store.fail_delete.lock().unwrap() = true;

        publisher(&store, &broker, 10).process_batch().await;
        assert_eq!(store.ids().len(), 1);

        // At-least-once: the same event goes out again once delete recovers.
        *store.fail_delete.lock().unwrap() = false;
        publisher(&store, &broker, 10).process_batch().await;
        assert_eq!(
            *broker.published.lock().unwrap(),
            vec!["event.sticky", "event.sticky"]
        );
        assert!(store.ids().is_empty());
    }

    #[tokio::test]
    async fn respects_batch_size() {
        let store = Arc::new(MemoryOutbox::default());
        let broker = Arc::new(RecordingBroker::default());
        for n in 0..5 {
            store.push(&format!("event.{n}"));
        }

        publisher(&store, &broker, 2).process_batch().await;
        assert_eq!(broker.published.lock().unwrap().len(), 2);
        assert_eq!(store.ids().len(), 3);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = Arc::new(MemoryOutbox::default());
        let broker = Arc::new(RecordingBroker::default());
        let publisher = publisher(&store, &broker, 10);

        let token = CancellationToken::new();
        let handle = tokio::spawn(publisher.run(token.clone()));
        token.cancel();
        handle.await.unwrap();
    }
}
