//! Order API handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::core::error::{ServiceError, ServiceResult};
use crate::domain::{Order, OrderItem, is_valid_id};
use crate::services::CreateOrderRequest;

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<OrderItemResponse>,
    pub status: String,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price.cents(),
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            items: order.items.into_iter().map(Into::into).collect(),
            status: order.status.as_str().to_string(),
            total_amount: order.total_amount.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/orders
pub async fn create(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(request): Json<CreateOrderRequest>,
) -> ServiceResult<(StatusCode, Json<OrderResponse>)> {
    let idempotency_key = headers
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok());

    let order = state.orders.create_order(idempotency_key, &request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// GET /api/v1/orders/{id}
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> ServiceResult<Json<OrderResponse>> {
    if !is_valid_id(&id) {
        return Err(ServiceError::invalid_request("Invalid order ID"));
    }
    let order = state.orders.get_order(&id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// PATCH /api/v1/orders/{id}/status
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ServiceResult<Json<MessageResponse>> {
    if !is_valid_id(&id) {
        return Err(ServiceError::invalid_request("Invalid order ID"));
    }
    state.orders.update_order_status(&id, &request.status).await?;
    Ok(Json(MessageResponse {
        message: "Order status updated successfully".to_string(),
    }))
}
