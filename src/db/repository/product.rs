//! Product repository

use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use super::{ProductStore, map_driver_error, parse_object_id};
use crate::core::error::{ServiceError, ServiceResult};
use crate::db::models::ProductDocument;
use crate::db::transaction::StoreSession;
use crate::domain::Product;

const PRODUCT_COLLECTION: &str = "products";

pub struct MongoProductRepository {
    collection: Collection<ProductDocument>,
}

impl MongoProductRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(PRODUCT_COLLECTION),
        }
    }
}

#[async_trait]
impl ProductStore for MongoProductRepository {
    async fn create(&self, product: &mut Product) -> ServiceResult<()> {
        let now = Utc::now();
        product.created_at = now;
        product.updated_at = now;

        let document = ProductDocument::from_domain(product);
        let result = self
            .collection
            .insert_one(&document)
            .await
            .map_err(map_driver_error)?;

        let inserted_id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ServiceError::internal("insert did not return an object id"))?;
        product.id = inserted_id.to_hex();
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> ServiceResult<Product> {
        let object_id = parse_object_id(id)?;
        let document = self
            .collection
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(map_driver_error)?
            .ok_or_else(|| ServiceError::not_found("entity not found"))?;
        Ok(document.into_domain())
    }

    async fn get_all(&self) -> ServiceResult<Vec<Product>> {
        let mut cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(map_driver_error)?;

        let mut products = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(map_driver_error)? {
            products.push(document.into_domain());
        }
        Ok(products)
    }

    async fn deduct_stock(
        &self,
        id: &str,
        quantity: u32,
        session: &mut StoreSession,
    ) -> ServiceResult<()> {
        let object_id = parse_object_id(id)?;
        let quantity = i64::from(quantity);
        // Conditional decrement: matches only while enough stock remains, so
        // concurrent deductions can never drive stock negative.
        let filter = doc! { "_id": object_id, "stock": { "$gte": quantity } };
        let update = doc! { "$inc": { "stock": -quantity } };

        let updated = match session.client_session() {
            Some(client_session) => {
                self.collection
                    .find_one_and_update(filter, update)
                    .session(client_session)
                    .await
            }
            None => self.collection.find_one_and_update(filter, update).await,
        }
        .map_err(map_driver_error)?;

        if updated.is_none() {
            return Err(ServiceError::unprocessable_entity(format!(
                "insufficient stock for product {id}"
            )));
        }
        Ok(())
    }
}
