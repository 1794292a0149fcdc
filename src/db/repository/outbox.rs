//! Outbox repository

use async_trait::async_trait;
use bson::doc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use super::{map_driver_error, parse_object_id};
use crate::core::error::ServiceResult;
use crate::db::models::OutboxDocument;
use crate::db::transaction::StoreSession;
use crate::outbox::{OutboxEntry, OutboxStore};

const OUTBOX_COLLECTION: &str = "outbox";

pub struct MongoOutboxRepository {
    collection: Collection<OutboxDocument>,
}

impl MongoOutboxRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(OUTBOX_COLLECTION),
        }
    }
}

#[async_trait]
impl OutboxStore for MongoOutboxRepository {
    async fn insert(&self, entry: OutboxEntry, session: &mut StoreSession) -> ServiceResult<()> {
        let document = OutboxDocument::from_entry(&entry);
        match session.client_session() {
            Some(client_session) => {
                self.collection
                    .insert_one(&document)
                    .session(client_session)
                    .await
            }
            None => self.collection.insert_one(&document).await,
        }
        .map_err(map_driver_error)?;
        Ok(())
    }

    async fn fetch_pending(&self, limit: u32) -> ServiceResult<Vec<OutboxEntry>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .sort(doc! { "created_at": 1 })
            .limit(i64::from(limit))
            .await
            .map_err(map_driver_error)?;

        let mut entries = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(map_driver_error)? {
            entries.push(document.into_entry());
        }
        Ok(entries)
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        let object_id = parse_object_id(id)?;
        self.collection
            .delete_one(doc! { "_id": object_id })
            .await
            .map_err(map_driver_error)?;
        Ok(())
    }
}
