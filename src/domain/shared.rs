use serde::{Deserialize, Serialize};

/// Storage-assigned identifier, rendered as a 24-character hex string.
pub type Id = String;

/// Checks the shape of a storage id without touching the database.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Monetary amount in integer minor units (cents).
///
/// All arithmetic stays in minor units; there is no floating point anywhere
/// on the money path.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }

    pub fn multiply(self, factor: u32) -> Amount {
        Amount(self.0 * i64::from(factor))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain event destined for the message bus.
///
/// `entity_name` selects the `exchange.<entity>` exchange, `name` is the
/// routing key. The serialized body must carry everything a downstream
/// consumer needs.
pub trait Event: Serialize {
    fn name(&self) -> &'static str;
    fn entity_name(&self) -> &'static str;
}
