//! Sphere Lattice
//!
//! A bounded pool of storage slots reachable through three coexisting
//! addressing schemes, with transparent compression and integrity
//! verification on every write and read.
//!
//! # Architecture
//!
//! ```text
//! SphereLattice (facade)
//!   ├─→ AtlasIndex       path → compressed payload   (decoupled from pool)
//!   ├─→ ContentIndex     content hash → SlotId ─┐
//!   ├─→ CoordinateIndex  "{lat}_{lon}" → SlotId ─┼─→ SlotPool (layers 1–11)
//!   ├─→ CrossReferenceTable (append-only links)  │
//!   ├─→ Journal (one framed record per store)  ←─┘
//!   └─→ PayloadCache (LRU over decompressed payloads)
//! ```
//!
//! Every store appends exactly one journal record covering both the slot
//! write and its index row, then applies it in memory. Recovery replays the
//! journal sequentially, last write wins.

pub mod atlas;
pub mod cache;
pub mod codec;
pub mod content;
pub mod coordinate;
pub mod crossref;
pub mod engine;
pub mod integrity;
pub mod journal;
pub mod pool;
pub mod slot;

pub use atlas::{normalize_path, AtlasEntry, AtlasIndex};
pub use cache::{CacheStats, PayloadCache};
pub use content::{ContentEntry, ContentIndex, DEFAULT_CONTENT_TYPE};
pub use coordinate::{coordinate_key, CoordinateEntry, CoordinateIndex};
pub use crossref::{CrossReference, CrossReferenceTable, LinkedKey};
pub use engine::{AddressMode, LatticeStats, SphereLattice, StoreLocation, StoreReceipt};
pub use integrity::Digest;
pub use journal::{Journal, JournalRecord};
pub use pool::{PoolStats, SlotPool};
pub use slot::{Slot, SlotId, MAX_LAYER, MIN_LAYER};
