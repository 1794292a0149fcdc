//! Small shared helpers.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a value's canonical JSON form.
///
/// Struct field order makes serialization deterministic, so equal payloads
/// always hash equal. Used to detect idempotency-key reuse with a different
/// payload.
pub fn hash_json<T: serde::Serialize>(value: &T) -> String {
    let data = serde_json::to_vec(value).unwrap_or_default();
    let digest = Sha256::digest(&data);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
