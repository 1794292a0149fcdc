use bson::oid::ObjectId;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outbox::OutboxEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub event_name: String,
    pub entity_name: String,
    /// JSON event body, stored as text.
    pub event_data: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl OutboxDocument {
    pub fn from_entry(entry: &OutboxEntry) -> Self {
        Self {
            id: None,
            event_name: entry.event_name.clone(),
            entity_name: entry.entity_name.clone(),
            event_data: String::from_utf8_lossy(&entry.event_data).into_owned(),
            created_at: Utc::now(),
        }
    }

    pub fn into_entry(self) -> OutboxEntry {
        OutboxEntry {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            event_name: self.event_name,
            entity_name: self.entity_name,
            event_data: self.event_data.into_bytes(),
        }
    }
}
