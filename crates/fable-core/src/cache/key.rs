//! Content-addressable key derivation
//!
//! A request is fingerprinted by its conversation state, the chosen action,
//! and the inventory set. The fingerprint is canonicalized (inventory
//! sorted, turns reduced to speaker + text) and digested so that two
//! semantically identical requests always address the same cache slot.

use crate::error::FableResult;
use crate::model::{ConversationState, Speaker};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Fixed-length lowercase hex digest addressing one cache slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The canonical description of one generation request
#[derive(Debug, Clone)]
pub struct RequestFingerprint<'a> {
    pub conversation: &'a ConversationState,
    pub action: &'a str,
    /// Order-independent auxiliary set; sorted during canonicalization
    pub inventory: &'a [String],
}

impl<'a> RequestFingerprint<'a> {
    pub fn new(
        conversation: &'a ConversationState,
        action: &'a str,
        inventory: &'a [String],
    ) -> Self {
        Self {
            conversation,
            action,
            inventory,
        }
    }
}

/// Serialized form fed to the digest. Field order is fixed by the struct
/// definition and all collections are explicitly ordered, so the rendered
/// JSON is deterministic.
#[derive(Serialize)]
struct CanonicalFingerprint<'a> {
    turns: Vec<CanonicalTurn<'a>>,
    action: &'a str,
    inventory: Vec<&'a str>,
}

#[derive(Serialize)]
struct CanonicalTurn<'a> {
    speaker: Speaker,
    text: &'a str,
}

/// Derive the cache key for a story request.
///
/// Pure and deterministic: no randomness, no dependence on container
/// enumeration order, no I/O.
pub fn derive(fingerprint: &RequestFingerprint<'_>) -> FableResult<CacheKey> {
    let mut inventory: Vec<&str> = fingerprint.inventory.iter().map(String::as_str).collect();
    inventory.sort_unstable();
    inventory.dedup();

    let canonical = CanonicalFingerprint {
        turns: fingerprint
            .conversation
            .turns
            .iter()
            .map(|t| CanonicalTurn {
                speaker: t.speaker,
                text: &t.text,
            })
            .collect(),
        action: fingerprint.action,
        inventory,
    };

    let serialized = serde_json::to_string(&canonical)?;
    Ok(digest_str("story", &serialized))
}

/// Derive the cache key for an image request from its rendered prompt.
pub fn derive_image(prompt: &str) -> CacheKey {
    digest_str("image", prompt)
}

fn digest_str(namespace: &str, input: &str) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    CacheKey(hex)
}
