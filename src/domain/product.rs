use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{Amount, Id};

/// Catalog product. Only `stock` is mutable after creation, and only through
/// the conditional deduction on the order write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub price: Amount,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: String, description: String, price: Amount, stock: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Id::new(),
            name,
            description,
            price,
            stock,
            created_at: now,
            updated_at: now,
        }
    }
}
