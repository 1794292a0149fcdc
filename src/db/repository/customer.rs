//! Customer repository

use async_trait::async_trait;
use bson::doc;
use mongodb::{Collection, Database};

use super::{CustomerStore, map_driver_error, parse_object_id};
use crate::core::error::{ServiceError, ServiceResult};
use crate::db::models::CustomerDocument;
use crate::domain::Id;

const CUSTOMER_COLLECTION: &str = "customers";

pub struct MongoCustomerRepository {
    collection: Collection<CustomerDocument>,
}

impl MongoCustomerRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.collection(CUSTOMER_COLLECTION),
        }
    }
}

#[async_trait]
impl CustomerStore for MongoCustomerRepository {
    async fn create(&self) -> ServiceResult<Id> {
        let result = self
            .collection
            .insert_one(CustomerDocument::default())
            .await
            .map_err(map_driver_error)?;

        let inserted_id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ServiceError::internal("insert did not return an object id"))?;
        Ok(inserted_id.to_hex())
    }

    async fn exists(&self, id: &str) -> ServiceResult<bool> {
        let object_id = parse_object_id(id)?;
        let found = self
            .collection
            .find_one(doc! { "_id": object_id })
            .await
            .map_err(map_driver_error)?;
        match found {
            Some(_) => Ok(true),
            None => Err(ServiceError::not_found("entity not found")),
        }
    }
}
