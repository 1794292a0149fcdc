//! Order aggregate and its status-change event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{Amount, Event, Id};

/// Lifecycle states of an order.
///
/// Any transition to a *different* valid state is accepted by the write
/// path; stricter transition rules belong to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order. `product_name` and `unit_price` are snapshots taken
/// at order creation; later catalog edits do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Id,
    pub product_id: Id,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Amount,
}

impl OrderItem {
    pub fn new(product_id: Id, product_name: String, quantity: u32, unit_price: Amount) -> Self {
        Self {
            id: Id::new(),
            product_id,
            product_name,
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Amount {
        self.unit_price.multiply(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Empty until the storage layer assigns an id on insert.
    pub id: Id,
    pub customer_id: Id,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(customer_id: Id, status: OrderStatus, items: Vec<OrderItem>) -> Self {
        let now = Utc::now();
        let total_amount = total_amount(&items);
        Self {
            id: Id::new(),
            customer_id,
            items,
            status,
            total_amount,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn total_amount(items: &[OrderItem]) -> Amount {
    items
        .iter()
        .fold(Amount::ZERO, |acc, item| acc.add(item.line_total()))
}

/// Emitted whenever an order moves to a new status. Persisted through the
/// outbox, so the body must be self-contained for downstream consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: Id,
    pub status: OrderStatus,
    pub old_status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub customer_id: Id,
}

impl Event for OrderStatusChanged {
    fn name(&self) -> &'static str {
        "order.update_status"
    }

    fn entity_name(&self) -> &'static str {
        "order"
    }
}
