use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Customers carry no attributes today; the document exists so orders have a
/// referent for existence checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
}
