//! Product API handlers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::ServerState;
use crate::core::error::ServiceResult;
use crate::domain::Product;
use crate::services::CreateProductRequest;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price.cents(),
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// POST /api/v1/products
pub async fn create(
    State(state): State<ServerState>,
    Json(request): Json<CreateProductRequest>,
) -> ServiceResult<(StatusCode, Json<ProductResponse>)> {
    let product = state.products.create_product(&request).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

/// GET /api/v1/products
pub async fn list(
    State(state): State<ServerState>,
) -> ServiceResult<Json<Vec<ProductResponse>>> {
    let products = state.products.get_all().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}
