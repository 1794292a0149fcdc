//! Customer service

use std::sync::Arc;

use crate::core::error::{ServiceError, ServiceResult};
use crate::db::repository::CustomerStore;
use crate::domain::Id;

pub struct CustomerService {
    customers: Arc<dyn CustomerStore>,
}

impl CustomerService {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    pub async fn create(&self) -> ServiceResult<Id> {
        self.customers.create().await
    }

    /// Verifies the customer exists. NotFound keeps its kind; any other
    /// storage failure surfaces as Internal and rejects the caller's request
    /// rather than being treated as a successful check.
    pub async fn exists(&self, id: &str) -> ServiceResult<()> {
        match self.customers.exists(id).await {
            Ok(_) => Ok(()),
            Err(ServiceError::NotFound(_)) => {
                Err(ServiceError::not_found("customer not found"))
            }
            Err(err) => {
                tracing::error!(error = %err, customer_id = %id, "customer: exists check failed");
                Err(ServiceError::internal(err.to_string()))
            }
        }
    }
}
