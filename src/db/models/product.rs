use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, Product};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ProductDocument {
    pub fn from_domain(product: &Product) -> Self {
        Self {
            id: None,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.cents(),
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }

    pub fn into_domain(self) -> Product {
        Product {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: self.name,
            description: self.description,
            price: Amount::from_cents(self.price),
            stock: self.stock,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
