//! Content-hash index backed by the slot pool
//!
//! Keys are externally supplied content hash strings; the engine never
//! computes them from the payload. Re-storing an existing hash is an
//! idempotent upsert that reuses the entry's slot.

use super::integrity::Digest;
use super::slot::SlotId;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Content type recorded when the caller supplies none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A content-addressed index row
#[derive(Debug, Clone)]
pub struct ContentEntry {
    /// Externally supplied content hash, unique within the index
    pub content_hash: String,
    /// Pool slot holding the compressed payload
    pub slot_id: SlotId,
    /// Declared content type
    pub content_type: String,
    /// Advisory telemetry only; never consulted for control flow
    pub compression_ratio: f64,
    /// Checksum over the compressed payload, mirrors the slot's
    pub checksum: Digest,
}

/// Reject malformed content hash keys
pub fn validate_content_hash(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("content hash is empty".to_string()));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidKey(format!(
            "content hash {:?} contains whitespace or control characters",
            key
        )));
    }
    Ok(())
}

/// Hash-keyed entry table
#[derive(Debug, Default)]
pub struct ContentIndex {
    entries: HashMap<String, ContentEntry>,
}

impl ContentIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its content hash
    pub fn upsert(&mut self, entry: ContentEntry) {
        self.entries.insert(entry.content_hash.clone(), entry);
    }

    /// Look up an entry by content hash
    pub fn get(&self, hash: &str) -> Option<&ContentEntry> {
        self.entries.get(hash)
    }

    /// Slot currently backing a hash, if any
    pub fn slot_of(&self, hash: &str) -> Option<SlotId> {
        self.entries.get(hash).map(|e| e.slot_id)
    }

    /// Whether a hash resolves
    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = &ContentEntry> {
        self.entries.values()
    }
}
