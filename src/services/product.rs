//! Product catalog service

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{ServiceError, ServiceResult};
use crate::db::StoreSession;
use crate::db::repository::ProductStore;
use crate::domain::{Amount, Product};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minor units (cents).
    pub price: i64,
    pub stock: i64,
}

pub struct ProductService {
    products: Arc<dyn ProductStore>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    pub async fn create_product(&self, request: &CreateProductRequest) -> ServiceResult<Product> {
        if request.name.trim().is_empty() {
            return Err(ServiceError::invalid_request("name is required"));
        }
        if request.price <= 0 {
            return Err(ServiceError::invalid_request(
                "price must be greater than zero",
            ));
        }
        if request.stock < 0 {
            return Err(ServiceError::invalid_request("stock must not be negative"));
        }

        let mut product = Product::new(
            request.name.clone(),
            request.description.clone(),
            Amount::from_cents(request.price),
            request.stock,
        );

        if let Err(err) = self.products.create(&mut product).await {
            tracing::error!(error = %err, name = %request.name, "product: create failed");
            return Err(err);
        }

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    pub async fn get_by_id(&self, id: &str) -> ServiceResult<Product> {
        self.products.get_by_id(id).await
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<Product>> {
        self.products.get_all().await
    }

    pub async fn deduct_stock(
        &self,
        id: &str,
        quantity: u32,
        session: &mut StoreSession,
    ) -> ServiceResult<()> {
        self.products.deduct_stock(id, quantity, session).await
    }
}
