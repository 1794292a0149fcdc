//! Order repository

use std::sync::Arc;

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::future::FutureExt;
use mongodb::{Client, Collection, Database, IndexModel};

use super::{MongoOutboxRepository, OrderStore, map_driver_error, parse_object_id};
use crate::core::error::{ServiceError, ServiceResult};
use crate::db::models::OrderDocument;
use crate::db::transaction::{StoreSession, run_in_transaction, tx_work};
use crate::domain::{Event, Order, OrderStatus, OrderStatusChanged};
use crate::outbox::{OutboxEntry, OutboxStore};

const ORDER_COLLECTION: &str = "orders";

pub struct MongoOrderRepository {
    client: Client,
    collection: Collection<OrderDocument>,
    outbox: Arc<MongoOutboxRepository>,
}

impl MongoOrderRepository {
    pub fn new(client: Client, database: &Database, outbox: Arc<MongoOutboxRepository>) -> Self {
        Self {
            client,
            collection: database.collection(ORDER_COLLECTION),
            outbox,
        }
    }

    /// Lookup indexes used by the read side; called once at startup.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let indexes = vec![
            IndexModel::builder().keys(doc! { "customer_id": 1 }).build(),
            IndexModel::builder().keys(doc! { "status": 1 }).build(),
            IndexModel::builder()
                .keys(doc! { "customer_id": 1, "status": 1 })
                .build(),
        ];
        self.collection.create_indexes(indexes).await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MongoOrderRepository {
    async fn create(&self, order: &mut Order, session: &mut StoreSession) -> ServiceResult<()> {
        if !order.id.is_empty() {
            return Err(ServiceError::internal("cannot create order with existing ID"));
        }

        let now = Utc::now();
        order.created_at = now;
        order.updated_at = now;

        let document = OrderDocument::from_domain(order)?;
        let result = match session.client_session() {
            Some(client_session) => {
                self.collection
                    .insert_one(&document)
                    .session(client_session)
                    .await
            }
            None => self.collection.insert_one(&document).await,
        }
        .map_err(map_driver_error)?;

        let inserted_id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ServiceError::internal("insert did not return an object id"))?;
        order.id = inserted_id.to_hex();

        for (item, item_document) in order.items.iter_mut().zip(&document.items) {
            item.id = item_document.id.to_hex();
        }

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> ServiceResult<Order> {
        let object_id = parse_object_id(id)?;
        let document = self
            .collection
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(map_driver_error)?
            .ok_or_else(|| ServiceError::not_found("entity not found"))?;
        document.into_domain()
    }

    async fn update_status_with_outbox(
        &self,
        id: &str,
        status: OrderStatus,
        event: &OrderStatusChanged,
    ) -> ServiceResult<()> {
        let object_id = parse_object_id(id)?;
        let payload = serde_json::to_vec(event)
            .map_err(|e| ServiceError::internal(format!("encode event failed: {e}")))?;
        let entry = OutboxEntry {
            id: String::new(),
            event_name: event.name().to_string(),
            entity_name: event.entity_name().to_string(),
            event_data: payload,
        };

        let collection = self.collection.clone();
        let outbox = Arc::clone(&self.outbox);

        run_in_transaction(
            &self.client,
            tx_work(move |session: &mut StoreSession| {
                async move {
                    let update = match session.client_session() {
                        Some(client_session) => {
                            collection
                                .update_one(
                                    doc! { "_id": object_id },
                                    doc! { "$set": {
                                        "status": status.as_str(),
                                        "updated_at": bson::DateTime::now(),
                                    }},
                                )
                                .session(client_session)
                                .await
                        }
                        None => {
                            collection
                                .update_one(
                                    doc! { "_id": object_id },
                                    doc! { "$set": {
                                        "status": status.as_str(),
                                        "updated_at": bson::DateTime::now(),
                                    }},
                                )
                                .await
                        }
                    }
                    .map_err(map_driver_error)?;

                    if update.matched_count == 0 {
                        return Err(ServiceError::not_found("entity not found"));
                    }

                    outbox.insert(entry, session).await
                }
                .boxed()
            }),
        )
        .await
    }
}
