//! Bounded, growable slot pool
//!
//! Slots are created lazily on first demand and reused in place for
//! idempotent re-stores. Free slots are tracked in a min-heap (the lowest
//! id is reused first) rather than found by linear scan. Growth past the
//! configured capacity is allowed unless the policy disables it.

use super::integrity::Digest;
use super::slot::{Slot, SlotId, MAX_LAYER, MIN_LAYER};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::debug;

/// The shared pool backing content and coordinate addressing
#[derive(Debug)]
pub struct SlotPool {
    /// All slots, indexed by `SlotId`
    slots: Vec<Slot>,
    /// Free slot ids, lowest first
    free: BinaryHeap<Reverse<u64>>,
    /// Slot count before the growth policy applies
    capacity: usize,
    /// Whether the pool may grow past `capacity`
    allow_growth: bool,
}

impl SlotPool {
    /// Create an empty pool with the given capacity policy
    pub fn new(capacity: usize, allow_growth: bool) -> Self {
        Self {
            slots: Vec::new(),
            free: BinaryHeap::new(),
            capacity,
            allow_growth,
        }
    }

    /// Pick the slot a write will land in, without claiming it
    ///
    /// If `existing` names a live slot, that slot is returned (the
    /// idempotent re-store path). Otherwise the lowest free slot wins,
    /// and failing that the next append position. Nothing is mutated
    /// beyond pruning stale free-list entries, so a caller whose journal
    /// append fails leaves the pool untouched; the claim happens in
    /// [`commit_write`](Self::commit_write) under the same lock.
    pub fn reserve(&mut self, existing: Option<SlotId>) -> Result<SlotId> {
        if let Some(id) = existing {
            if self.is_live(id) {
                return Ok(id);
            }
        }

        // Drop free-list entries for slots that have since been written
        while let Some(Reverse(raw)) = self.free.peek().copied() {
            match self.slots.get(raw as usize) {
                Some(slot) if slot.is_free() => return Ok(SlotId::new(raw)),
                _ => {
                    self.free.pop();
                }
            }
        }

        let next = self.slots.len();
        if next < self.capacity || self.allow_growth {
            Ok(SlotId::new(next as u64))
        } else {
            Err(Error::Capacity(format!(
                "pool full at {} slots with growth disabled",
                self.capacity
            )))
        }
    }

    /// Write a compressed payload into a slot, growing the pool if needed
    pub fn commit_write(
        &mut self,
        id: SlotId,
        compressed: Vec<u8>,
        checksum: Digest,
        created_at: DateTime<Utc>,
    ) {
        while self.slots.len() <= id.index() {
            let gap_id = SlotId::new(self.slots.len() as u64);
            self.slots.push(Slot::empty(gap_id));
            if gap_id != id {
                self.free.push(Reverse(gap_id.0));
            }
        }

        if self.free.peek() == Some(&Reverse(id.0)) {
            self.free.pop();
        }

        let slot = &mut self.slots[id.index()];
        slot.compressed = Some(compressed);
        slot.checksum = Some(checksum);
        slot.created_at = created_at;

        debug!(%id, "Committed slot write");
    }

    /// Read the compressed payload and checksum of a live slot
    pub fn read(&self, id: SlotId) -> Result<(&[u8], &Digest)> {
        let slot = self
            .slots
            .get(id.index())
            .ok_or_else(|| Error::NotFound(format!("{} is outside the pool", id)))?;
        match (&slot.compressed, &slot.checksum) {
            (Some(compressed), Some(checksum)) => Ok((compressed.as_slice(), checksum)),
            _ => Err(Error::NotFound(format!("{} holds no payload", id))),
        }
    }

    /// Access a slot record directly
    pub fn get(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id.index())
    }

    /// Whether the id names a written slot
    pub fn is_live(&self, id: SlotId) -> bool {
        self.slots.get(id.index()).is_some_and(|s| !s.is_free())
    }

    /// Number of slots in the pool, free or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the pool holds no slots at all
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Test hook: mutable access to a slot record
    #[cfg(test)]
    pub(crate) fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())
    }

    /// Occupancy statistics with a per-layer histogram of written slots
    pub fn stats(&self) -> PoolStats {
        let mut histogram = [0u64; MAX_LAYER as usize];
        let mut occupied = 0;
        for slot in &self.slots {
            if !slot.is_free() {
                occupied += 1;
                let layer = slot.layer.clamp(MIN_LAYER, MAX_LAYER);
                histogram[(layer - 1) as usize] += 1;
            }
        }
        PoolStats {
            total: self.slots.len(),
            occupied,
            empty: self.slots.len() - occupied,
            layer_histogram: histogram,
        }
    }
}

/// Pool occupancy statistics
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub occupied: usize,
    pub empty: usize,
    /// Written slots per layer; index 0 is layer 1
    pub layer_histogram: [u64; MAX_LAYER as usize],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::integrity;

    fn write(pool: &mut SlotPool, id: SlotId, payload: &[u8]) {
        pool.commit_write(id, payload.to_vec(), integrity::checksum(payload), Utc::now());
    }

    #[test]
    fn test_reserve_appends_sequentially() -> Result<()> {
        let mut pool = SlotPool::new(108, true);

        let first = pool.reserve(None)?;
        write(&mut pool, first, b"a");
        let second = pool.reserve(None)?;
        write(&mut pool, second, b"b");

        assert_eq!(first, SlotId::new(0));
        assert_eq!(second, SlotId::new(1));
        assert_eq!(pool.len(), 2);
        Ok(())
    }

    #[test]
    fn test_reserve_is_idempotent_for_live_slots() -> Result<()> {
        let mut pool = SlotPool::new(108, true);

        let id = pool.reserve(None)?;
        write(&mut pool, id, b"first");
        let again = pool.reserve(Some(id))?;
        assert_eq!(again, id);

        // A dead hint falls through to normal allocation
        let fresh = pool.reserve(Some(SlotId::new(99)))?;
        assert_eq!(fresh, SlotId::new(1));
        Ok(())
    }

    #[test]
    fn test_reserve_prefers_free_slots() -> Result<()> {
        let mut pool = SlotPool::new(108, true);

        // Committing past the end leaves a gap of free slots behind it
        write(&mut pool, SlotId::new(2), b"c");
        assert_eq!(pool.len(), 3);

        assert_eq!(pool.reserve(None)?, SlotId::new(0));
        write(&mut pool, SlotId::new(0), b"a");
        assert_eq!(pool.reserve(None)?, SlotId::new(1));
        write(&mut pool, SlotId::new(1), b"b");
        assert_eq!(pool.reserve(None)?, SlotId::new(3));
        Ok(())
    }

    #[test]
    fn test_capacity_policy() -> Result<()> {
        let mut pool = SlotPool::new(2, false);

        let first = pool.reserve(None)?;
        write(&mut pool, first, b"a");
        let second = pool.reserve(None)?;
        write(&mut pool, second, b"b");

        let result = pool.reserve(None);
        assert!(matches!(result, Err(Error::Capacity(_))));

        // The idempotent path still works on a full pool
        assert_eq!(pool.reserve(Some(SlotId::new(0)))?, SlotId::new(0));
        Ok(())
    }

    #[test]
    fn test_growth_past_capacity() -> Result<()> {
        let mut pool = SlotPool::new(1, true);
        let first = pool.reserve(None)?;
        write(&mut pool, first, b"a");
        let second = pool.reserve(None)?;
        write(&mut pool, second, b"b");
        assert_eq!(pool.len(), 2);
        Ok(())
    }

    #[test]
    fn test_read_failures() {
        let mut pool = SlotPool::new(108, true);
        write(&mut pool, SlotId::new(1), b"x");

        assert!(matches!(pool.read(SlotId::new(5)), Err(Error::NotFound(_))));
        assert!(matches!(pool.read(SlotId::new(0)), Err(Error::NotFound(_))));
        assert!(pool.read(SlotId::new(1)).is_ok());
    }

    #[test]
    fn test_stats_histogram() -> Result<()> {
        let mut pool = SlotPool::new(108, true);
        let first = pool.reserve(None)?;
        write(&mut pool, first, b"a");
        let second = pool.reserve(None)?;
        write(&mut pool, second, b"b");

        let stats = pool.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.occupied, 2);
        assert_eq!(stats.empty, 0);
        assert_eq!(stats.layer_histogram[0], 2);
        assert_eq!(stats.layer_histogram[1..].iter().sum::<u64>(), 0);
        Ok(())
    }
}
