//! Slot management for the shared pool

use super::integrity::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest slot layer
pub const MIN_LAYER: u8 = 1;
/// Highest slot layer
pub const MAX_LAYER: u8 = 11;

/// Clamp a raw depth value into the valid layer range
pub fn clamp_layer(depth: usize) -> u8 {
    depth.clamp(MIN_LAYER as usize, MAX_LAYER as usize) as u8
}

/// Unique identifier for a slot in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u64);

impl SlotId {
    /// Create a new slot ID
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Position of this slot in the pool
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.0)
    }
}

/// A slot in the shared pool
///
/// A slot with no payload is free; a written slot holds one compressed
/// payload and the checksum computed over those compressed bytes.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Unique ID
    pub id: SlotId,
    /// Layer classification, 1–11
    pub layer: u8,
    /// Compressed payload; `None` while the slot is free
    pub compressed: Option<Vec<u8>>,
    /// Checksum over the compressed payload
    pub checksum: Option<Digest>,
    /// When this slot was first written
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// Create a new free slot
    pub fn empty(id: SlotId) -> Self {
        Self {
            id,
            layer: MIN_LAYER,
            compressed: None,
            checksum: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this slot currently holds no payload
    pub fn is_free(&self) -> bool {
        self.compressed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::integrity;

    #[test]
    fn test_slot_id() {
        let id = SlotId::new(42);
        assert_eq!(id.index(), 42);
        assert_eq!(format!("{}", id), "Slot(42)");
    }

    #[test]
    fn test_slot_lifecycle() {
        let slot = Slot::empty(SlotId::new(0));
        assert!(slot.is_free());
        assert_eq!(slot.layer, MIN_LAYER);

        let mut slot = slot;
        slot.compressed = Some(vec![1, 2, 3]);
        slot.checksum = Some(integrity::checksum(&[1, 2, 3]));
        assert!(!slot.is_free());
    }

    #[test]
    fn test_clamp_layer() {
        assert_eq!(clamp_layer(0), 1);
        assert_eq!(clamp_layer(1), 1);
        assert_eq!(clamp_layer(7), 7);
        assert_eq!(clamp_layer(11), 11);
        assert_eq!(clamp_layer(50), 11);
    }
}
