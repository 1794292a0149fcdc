//! RabbitMQ broker adapter
//!
//! Lazy and self-healing: the channel is (re)opened on demand under a mutex,
//! exchanges are redeclared after every reconnect, and a failed publish
//! discards the channel so the next attempt dials fresh. Publishes are
//! serialized; one in flight at a time.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;

use crate::core::config::RabbitMqConfig;
use crate::core::error::{ServiceError, ServiceResult};
use crate::domain::Event;

const PERSISTENT_DELIVERY: u8 = 2;

/// Bus publishing port used by the outbox relay.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_raw(
        &self,
        event_name: &str,
        entity_name: &str,
        payload: &[u8],
    ) -> ServiceResult<()>;
}

#[derive(Default)]
struct BrokerLink {
    connection: Option<Connection>,
    channel: Option<Channel>,
}

pub struct RabbitBroker {
    config: RabbitMqConfig,
    link: Mutex<BrokerLink>,
}

impl RabbitBroker {
    /// Dials eagerly so startup fails fast when the broker is unreachable.
    pub async fn connect(config: RabbitMqConfig) -> anyhow::Result<Self> {
        let broker = Self {
            config,
            link: Mutex::new(BrokerLink::default()),
        };
        {
            let mut link = broker.link.lock().await;
            broker
                .open_link(&mut link)
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect to RabbitMQ: {e}"))?;
        }
        Ok(broker)
    }

    async fn open_link(&self, link: &mut BrokerLink) -> Result<(), lapin::Error> {
        let connection =
            Connection::connect(&self.config.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        for exchange in &self.config.exchanges {
            channel
                .exchange_declare(
                    &exchange.name,
                    exchange_kind(&exchange.kind),
                    ExchangeDeclareOptions {
                        durable: exchange.durable,
                        auto_delete: exchange.auto_delete,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        link.connection = Some(connection);
        link.channel = Some(channel);
        Ok(())
    }

    /// Serializes a domain event and publishes it.
    pub async fn publish<E: Event>(&self, event: &E) -> ServiceResult<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| ServiceError::internal(format!("broker: encode event failed: {e}")))?;
        self.publish_with_retry(event.name(), event.entity_name(), &payload)
            .await
    }

    async fn publish_with_retry(
        &self,
        event_name: &str,
        entity_name: &str,
        payload: &[u8],
    ) -> ServiceResult<()> {
        let exchange = format!("exchange.{entity_name}");
        let properties = BasicProperties::default()
            .with_content_type("application/json".to_string().into())
            .with_delivery_mode(PERSISTENT_DELIVERY);

        let mut last_error = String::new();
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }

            let mut link = self.link.lock().await;
            if link.channel.is_none() {
                if let Err(err) = self.open_link(&mut link).await {
                    drop(link);
                    tracing::error!(error = %err, attempt = attempt + 1, "broker: reconnect failed");
                    last_error = format!("reconnect failed: {err}");
                    continue;
                }
            }

            let Some(channel) = link.channel.clone() else {
                continue;
            };

            match publish_once(&channel, &exchange, event_name, payload, properties.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    // Force a fresh dial on the next attempt.
                    link.channel = None;
                    drop(link);
                    tracing::error!(error = %err, attempt = attempt + 1, "broker: publish failed");
                    last_error = err.to_string();
                }
            }
        }

        Err(ServiceError::internal(format!(
            "failed to publish after {} attempts: {last_error}",
            self.config.max_retries + 1
        )))
    }

    /// Healthy iff the connection is open and a channel is bound.
    pub async fn health_check(&self) -> ServiceResult<()> {
        let link = self.link.lock().await;
        let connected = link
            .connection
            .as_ref()
            .is_some_and(|conn| conn.status().connected());
        if !connected {
            return Err(ServiceError::internal("connection is closed"));
        }
        if link.channel.is_none() {
            return Err(ServiceError::internal("channel is not open"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RabbitBroker {
    async fn publish_raw(
        &self,
        event_name: &str,
        entity_name: &str,
        payload: &[u8],
    ) -> ServiceResult<()> {
        self.publish_with_retry(event_name, entity_name, payload)
            .await
    }
}

async fn publish_once(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    payload: &[u8],
    properties: BasicProperties,
) -> Result<(), lapin::Error> {
    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            properties,
        )
        .await?
        .await?;
    Ok(())
}

fn exchange_kind(kind: &str) -> ExchangeKind {
    match kind {
        "topic" => ExchangeKind::Topic,
        "fanout" => ExchangeKind::Fanout,
        "headers" => ExchangeKind::Headers,
        _ => ExchangeKind::Direct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_kind_parses_known_types() {
        assert!(matches!(exchange_kind("direct"), ExchangeKind::Direct));
        assert!(matches!(exchange_kind("topic"), ExchangeKind::Topic));
        assert!(matches!(exchange_kind("fanout"), ExchangeKind::Fanout));
        assert!(matches!(exchange_kind("headers"), ExchangeKind::Headers));
        // Unknown types fall back to direct rather than failing startup.
        assert!(matches!(exchange_kind("nonsense"), ExchangeKind::Direct));
    }
}
