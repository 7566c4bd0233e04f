//! Deterministic batch fingerprints
//!
//! A fingerprint is the stable identity of one logical submission: the same
//! user submitting the same item set produces the same fingerprint no matter
//! how the items are ordered. It doubles as the externally visible batch id
//! and as the idempotency key.

use crate::core::types::BatchItem;
use sha2::{Digest, Sha256};

/// Field separator inside one canonicalized item
const FIELD_SEP: u8 = 0x1f;
/// Record separator between canonicalized items
const RECORD_SEP: u8 = 0x1e;

/// Derive the deterministic batch id for a `(user, item set)` pair
///
/// Items are sorted by `(scene_id, prompt, variant_count)` before hashing so
/// submission order does not affect the result. The digest is SHA-256 over a
/// canonical byte serialization, hex encoded.
pub fn generate_batch_id(user_id: &str, items: &[BatchItem]) -> String {
    let mut sorted: Vec<&BatchItem> = items.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.scene_id, &a.prompt, a.variant_count).cmp(&(&b.scene_id, &b.prompt, b.variant_count))
    });

    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([RECORD_SEP]);
    for item in sorted {
        hasher.update(item.scene_id.as_bytes());
        hasher.update([FIELD_SEP]);
        hasher.update(item.prompt.as_bytes());
        hasher.update([FIELD_SEP]);
        hasher.update(item.variant_count.to_be_bytes());
        hasher.update([RECORD_SEP]);
    }

    hex::encode(hasher.finalize())
}
