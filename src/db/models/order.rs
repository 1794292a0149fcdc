use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{ServiceError, ServiceResult};
use crate::domain::{Order, OrderItem, OrderStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub product_id: ObjectId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub customer_id: ObjectId,
    pub items: Vec<OrderItemDocument>,
    pub status: String,
    pub total_amount: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl OrderDocument {
    /// Builds the document for insertion, minting item ids where missing.
    pub fn from_domain(order: &Order) -> ServiceResult<Self> {
        let customer_id = ObjectId::parse_str(&order.customer_id)
            .map_err(|_| ServiceError::invalid_request("invalid ID format"))?;

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let product_id = ObjectId::parse_str(&item.product_id)
                .map_err(|_| ServiceError::invalid_request("invalid ID format"))?;
            let id = if item.id.is_empty() {
                ObjectId::new()
            } else {
                ObjectId::parse_str(&item.id)
                    .map_err(|_| ServiceError::invalid_request("invalid ID format"))?
            };
            items.push(OrderItemDocument {
                id,
                product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.cents(),
            });
        }

        let id = if order.id.is_empty() {
            None
        } else {
            Some(
                ObjectId::parse_str(&order.id)
                    .map_err(|_| ServiceError::invalid_request("invalid ID format"))?,
            )
        };

        Ok(Self {
            id,
            customer_id,
            items,
            status: order.status.as_str().to_string(),
            total_amount: order.total_amount.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    pub fn into_domain(self) -> ServiceResult<Order> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| {
            ServiceError::internal(format!("unknown order status in storage: {}", self.status))
        })?;

        let items = self
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: item.id.to_hex(),
                product_id: item.product_id.to_hex(),
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: crate::domain::Amount::from_cents(item.unit_price),
            })
            .collect();

        Ok(Order {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            customer_id: self.customer_id.to_hex(),
            items,
            status,
            total_amount: crate::domain::Amount::from_cents(self.total_amount),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
