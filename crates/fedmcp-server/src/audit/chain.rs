//! Hash chaining for audit events.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. JCS form of the event with `prevHash` and `hash` removed
//!
//! JCS makes the hash independent of how a backend reorders JSON keys
//! (PostgreSQL `jsonb` does).

use fedmcp_core::jcs_canonical_bytes;
use sha2::{Digest, Sha256};

use crate::models::AuditEvent;

/// `prev_hash` of the first chained event.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Computes the lowercase hex SHA-256 of an event linked to `prev_hash`.
pub fn hash_event(event: &AuditEvent, prev_hash: &str) -> Result<String, serde_json::Error> {
    let mut body = event.clone();
    body.prev_hash = None;
    body.hash = None;
    let canonical = jcs_canonical_bytes(&body)?;

    let mut hasher = Sha256::new();
    hasher.update(event.sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

/// Links `event` to `prev_hash` and fills in its own hash.
pub fn seal(event: &mut AuditEvent, prev_hash: &str) -> Result<(), serde_json::Error> {
    let hash = hash_event(event, prev_hash)?;
    event.prev_hash = Some(prev_hash.to_string());
    event.hash = Some(hash);
    Ok(())
}

/// Verifies linkage and hash correctness of events in append order.
///
/// Events written before chaining was enabled (no `hash`) may precede the
/// chain; once the first sealed event appears every later event must be
/// sealed too. An empty or fully unsealed log is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev: Option<String> = None;

    for event in events {
        let (Some(prev_hash), Some(hash)) = (&event.prev_hash, &event.hash) else {
            if expected_prev.is_some() {
                return false;
            }
            continue;
        };

        let expected = expected_prev.as_deref().unwrap_or(GENESIS_HASH);
        if prev_hash != expected {
            return false;
        }

        match hash_event(event, prev_hash) {
            Ok(recomputed) if &recomputed == hash => {}
            _ => return false,
        }

        expected_prev = Some(hash.clone());
    }

    true
}
