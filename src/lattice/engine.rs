//! Sphere lattice storage engine
//!
//! Integration layer combining the codec, integrity verification, the slot
//! pool, the three address indexes, the cross-reference table, the journal,
//! and the payload cache. This facade is the only mutation surface; external
//! collaborators call `store`, `retrieve`, `stats`, `link`, and
//! `resolve_linked` and never touch slot or index internals.
//!
//! Every store appends one journal record covering both the slot write and
//! its index row before anything is applied in memory, so observable state
//! and durable state can never disagree about which of the two happened.

use super::atlas::{self, AtlasEntry, AtlasIndex};
use super::cache::{CacheStats, PayloadCache};
use super::codec;
use super::content::{self, ContentEntry, ContentIndex, DEFAULT_CONTENT_TYPE};
use super::coordinate::{self, CoordinateEntry, CoordinateIndex};
use super::crossref::{CrossReference, CrossReferenceTable, LinkedKey};
use super::integrity::{self, Digest};
use super::journal::{Journal, JournalRecord};
use super::pool::{PoolStats, SlotPool};
use super::slot::SlotId;
use crate::config::LatticeConfig;
use crate::error::{Error, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Addressing scheme selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Hierarchical path addressing
    Atlas,
    /// Content-hash addressing
    Content,
    /// Quantized geocoordinate addressing
    Coordinate,
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressMode::Atlas => write!(f, "atlas"),
            AddressMode::Content => write!(f, "content"),
            AddressMode::Coordinate => write!(f, "coordinate"),
        }
    }
}

impl FromStr for AddressMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "atlas" => Ok(AddressMode::Atlas),
            "content" => Ok(AddressMode::Content),
            "coordinate" => Ok(AddressMode::Coordinate),
            other => Err(Error::InvalidKey(format!(
                "unknown address mode {:?}",
                other
            ))),
        }
    }
}

/// Where a stored payload landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Directly-addressed atlas record
    AtlasPath(String),
    /// Pool slot shared by content and coordinate addressing
    Slot(SlotId),
}

/// Result of a successful store
#[derive(Debug, Clone)]
pub struct StoreReceipt {
    /// Canonical form of the key the payload is reachable under
    pub key: String,
    /// Where the payload landed
    pub location: StoreLocation,
    /// Checksum over the compressed payload
    pub checksum: Digest,
    /// Advisory telemetry, compressed ÷ original
    pub compression_ratio: f64,
}

/// Occupancy report across the pool and all namespaces
#[derive(Debug, Clone, Serialize)]
pub struct LatticeStats {
    pub pool: PoolStats,
    pub atlas_entries: usize,
    pub content_entries: usize,
    pub coordinate_entries: usize,
    pub cross_references: usize,
    pub cache: CacheStats,
}

/// All mutable tables, guarded as one unit
struct LatticeState {
    pool: SlotPool,
    atlas: AtlasIndex,
    content: ContentIndex,
    coordinate: CoordinateIndex,
    crossrefs: CrossReferenceTable,
}

impl LatticeState {
    fn new(config: &LatticeConfig) -> Self {
        Self {
            pool: SlotPool::new(config.slot_capacity, config.allow_growth),
            atlas: AtlasIndex::new(),
            content: ContentIndex::new(),
            coordinate: CoordinateIndex::new(),
            crossrefs: CrossReferenceTable::new(),
        }
    }

    /// Apply a journal record; the single code path shared by live writes
    /// and recovery, so replay reproduces state exactly
    fn apply(&mut self, record: &JournalRecord) {
        match record {
            JournalRecord::AtlasPut {
                path,
                layer,
                compressed,
                checksum,
            } => {
                self.atlas.upsert(AtlasEntry {
                    path: path.clone(),
                    layer: *layer,
                    compressed: compressed.clone(),
                    checksum: *checksum,
                });
            }
            JournalRecord::ContentPut {
                content_hash,
                slot_id,
                content_type,
                compression_ratio,
                checksum,
                compressed,
                created_at,
            } => {
                self.pool
                    .commit_write(*slot_id, compressed.clone(), *checksum, *created_at);
                self.content.upsert(ContentEntry {
                    content_hash: content_hash.clone(),
                    slot_id: *slot_id,
                    content_type: content_type.clone(),
                    compression_ratio: *compression_ratio,
                    checksum: *checksum,
                });
            }
            JournalRecord::CoordinatePut {
                coordinate_key,
                precision,
                slot_id,
                checksum,
                temporal_start,
                temporal_end,
                compressed,
                created_at,
            } => {
                self.pool
                    .commit_write(*slot_id, compressed.clone(), *checksum, *created_at);
                self.coordinate.upsert(CoordinateEntry {
                    coordinate_key: coordinate_key.clone(),
                    precision: *precision,
                    slot_id: *slot_id,
                    temporal_start: *temporal_start,
                    temporal_end: *temporal_end,
                    checksum: *checksum,
                });
            }
            JournalRecord::CrossRef(row) => {
                self.crossrefs.append(row.clone());
            }
        }
    }
}

/// Multi-modal addressable storage engine
pub struct SphereLattice {
    state: RwLock<LatticeState>,
    journal: Journal,
    cache: PayloadCache,
    config: LatticeConfig,
}

impl fmt::Debug for SphereLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SphereLattice")
            .field("journal", &self.journal.path())
            .finish()
    }
}

impl SphereLattice {
    /// Open or create a lattice in the given directory
    pub fn open<P: AsRef<Path>>(base_path: P, config: LatticeConfig) -> Result<Self> {
        config.validate()?;
        let base_path = base_path.as_ref();
        info!(path = ?base_path, "Opening sphere lattice");

        let (journal, records) = Journal::open(base_path)?;
        let mut state = LatticeState::new(&config);
        for record in &records {
            state.apply(record);
        }

        info!(
            slots = state.pool.len(),
            atlas = state.atlas.len(),
            content = state.content.len(),
            coordinate = state.coordinate.len(),
            cross_references = state.crossrefs.len(),
            "Recovery complete"
        );

        let cache = PayloadCache::new(config.cache_capacity);
        Ok(Self {
            state: RwLock::new(state),
            journal,
            cache,
            config,
        })
    }

    /// Open with default configuration
    pub fn with_defaults<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        Self::open(base_path, LatticeConfig::default())
    }

    /// The configuration this lattice was opened with
    pub fn config(&self) -> &LatticeConfig {
        &self.config
    }

    /// Store a payload under the given addressing mode
    pub fn store(&self, mode: AddressMode, key: &str, data: &[u8]) -> Result<StoreReceipt> {
        match mode {
            AddressMode::Atlas => self.store_atlas(key, data),
            AddressMode::Content => self.store_content(key, data, DEFAULT_CONTENT_TYPE),
            AddressMode::Coordinate => self.store_coordinate(key, data),
        }
    }

    /// Content-mode store with an explicit content type
    pub fn store_with_content_type(
        &self,
        content_hash: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoreReceipt> {
        self.store_content(content_hash, data, content_type)
    }

    fn store_atlas(&self, path: &str, data: &[u8]) -> Result<StoreReceipt> {
        let path = atlas::normalize_path(path)?;
        let layer = atlas::path_layer(&path);

        let compressed = codec::compress(data, self.config.compression_level)?;
        let checksum = integrity::checksum(&compressed);
        let compression_ratio = codec::ratio(data.len(), compressed.len());

        let record = JournalRecord::AtlasPut {
            path: path.clone(),
            layer,
            compressed,
            checksum,
        };

        let mut state = self.state.write();
        self.journal.append(&record)?;
        state.apply(&record);
        self.cache.invalidate(&cache_key(AddressMode::Atlas, &path));
        drop(state);

        debug!(%path, layer, "Stored atlas entry");
        Ok(StoreReceipt {
            key: path.clone(),
            location: StoreLocation::AtlasPath(path),
            checksum,
            compression_ratio,
        })
    }

    fn store_content(
        &self,
        content_hash: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<StoreReceipt> {
        content::validate_content_hash(content_hash)?;

        let compressed = codec::compress(data, self.config.compression_level)?;
        let checksum = integrity::checksum(&compressed);
        let compression_ratio = codec::ratio(data.len(), compressed.len());

        let mut state = self.state.write();
        let existing = state.content.slot_of(content_hash);
        let slot_id = state.pool.reserve(existing)?;
        let created_at = state
            .pool
            .get(slot_id)
            .filter(|s| !s.is_free())
            .map(|s| s.created_at)
            .unwrap_or_else(Utc::now);

        let record = JournalRecord::ContentPut {
            content_hash: content_hash.to_string(),
            slot_id,
            content_type: content_type.to_string(),
            compression_ratio,
            checksum,
            compressed,
            created_at,
        };

        self.journal.append(&record)?;
        state.apply(&record);
        self.cache
            .invalidate(&cache_key(AddressMode::Content, content_hash));
        drop(state);

        debug!(hash = %content_hash, %slot_id, "Stored content entry");
        Ok(StoreReceipt {
            key: content_hash.to_string(),
            location: StoreLocation::Slot(slot_id),
            checksum,
            compression_ratio,
        })
    }

    fn store_coordinate(&self, key: &str, data: &[u8]) -> Result<StoreReceipt> {
        let (_, _, precision) = coordinate::parse_key(key)?;

        let compressed = codec::compress(data, self.config.compression_level)?;
        let checksum = integrity::checksum(&compressed);
        let compression_ratio = codec::ratio(data.len(), compressed.len());

        let mut state = self.state.write();
        let existing_entry = state
            .coordinate
            .get(key)
            .map(|e| (e.slot_id, e.temporal_start));
        let slot_id = state.pool.reserve(existing_entry.map(|(id, _)| id))?;
        let temporal_start = existing_entry.map(|(_, start)| start).unwrap_or_else(Utc::now);
        let created_at = state
            .pool
            .get(slot_id)
            .filter(|s| !s.is_free())
            .map(|s| s.created_at)
            .unwrap_or_else(Utc::now);

        let record = JournalRecord::CoordinatePut {
            coordinate_key: key.to_string(),
            precision,
            slot_id,
            checksum,
            temporal_start,
            temporal_end: None,
            compressed,
            created_at,
        };

        self.journal.append(&record)?;
        state.apply(&record);
        self.cache
            .invalidate(&cache_key(AddressMode::Coordinate, key));
        drop(state);

        debug!(coordinate = %key, precision, %slot_id, "Stored coordinate entry");
        Ok(StoreReceipt {
            key: key.to_string(),
            location: StoreLocation::Slot(slot_id),
            checksum,
            compression_ratio,
        })
    }

    /// Retrieve a payload by mode and key
    ///
    /// The checksum over the compressed bytes is re-verified on every read;
    /// a mismatch fails closed with `Error::Integrity` and the payload is
    /// never returned.
    pub fn retrieve(&self, mode: AddressMode, key: &str) -> Result<Vec<u8>> {
        let canonical = match mode {
            AddressMode::Atlas => atlas::normalize_path(key)?,
            AddressMode::Content => {
                content::validate_content_hash(key)?;
                key.to_string()
            }
            AddressMode::Coordinate => {
                coordinate::parse_key(key)?;
                key.to_string()
            }
        };

        let ck = cache_key(mode, &canonical);
        if let Some((_, payload)) = self.cache.get(&ck) {
            return Ok(payload);
        }

        let state = self.state.read();
        let (compressed, expected) = match mode {
            AddressMode::Atlas => {
                let entry = state.atlas.get(&canonical).ok_or_else(|| {
                    Error::NotFound(format!("no atlas entry at {:?}", canonical))
                })?;
                (entry.compressed.as_slice(), entry.checksum)
            }
            AddressMode::Content => {
                let entry = state.content.get(&canonical).ok_or_else(|| {
                    Error::NotFound(format!("no content entry for {:?}", canonical))
                })?;
                let (compressed, slot_checksum) =
                    state.pool.read(entry.slot_id).map_err(|_| {
                        Error::Integrity(format!(
                            "content entry {:?} references dead {}",
                            canonical, entry.slot_id
                        ))
                    })?;
                if *slot_checksum != entry.checksum {
                    return Err(Error::Integrity(format!(
                        "index and slot checksums diverge for {:?}",
                        canonical
                    )));
                }
                (compressed, entry.checksum)
            }
            AddressMode::Coordinate => {
                let entry = state.coordinate.get(&canonical).ok_or_else(|| {
                    Error::NotFound(format!("no coordinate entry at {:?}", canonical))
                })?;
                let (compressed, slot_checksum) =
                    state.pool.read(entry.slot_id).map_err(|_| {
                        Error::Integrity(format!(
                            "coordinate entry {:?} references dead {}",
                            canonical, entry.slot_id
                        ))
                    })?;
                if *slot_checksum != entry.checksum {
                    return Err(Error::Integrity(format!(
                        "index and slot checksums diverge for {:?}",
                        canonical
                    )));
                }
                (compressed, entry.checksum)
            }
        };

        if !integrity::verify(compressed, &expected) {
            return Err(Error::Integrity(format!(
                "checksum mismatch for {} key {:?}",
                mode, canonical
            )));
        }

        let payload = codec::decompress(compressed)?;
        // Fill the cache before releasing the read lock so a concurrent
        // writer's invalidation cannot be overtaken by a stale fill
        self.cache.put(ck, expected, payload.clone());
        drop(state);

        debug!(%mode, key = %canonical, bytes = payload.len(), "Retrieved payload");
        Ok(payload)
    }

    /// Append a cross-reference linking entries across namespaces
    ///
    /// At least one key must be given, and every given key must currently
    /// resolve in its owning index.
    pub fn link(
        &self,
        atlas_path: Option<&str>,
        content_hash: Option<&str>,
        coordinate_key: Option<&str>,
        reference_type: &str,
    ) -> Result<Uuid> {
        if atlas_path.is_none() && content_hash.is_none() && coordinate_key.is_none() {
            return Err(Error::InvalidKey(
                "cross-reference names no keys".to_string(),
            ));
        }

        let atlas_path = atlas_path.map(atlas::normalize_path).transpose()?;
        if let Some(hash) = content_hash {
            content::validate_content_hash(hash)?;
        }
        if let Some(key) = coordinate_key {
            coordinate::parse_key(key)?;
        }

        let mut state = self.state.write();
        if let Some(ref path) = atlas_path {
            if !state.atlas.contains(path) {
                return Err(Error::InvalidKey(format!(
                    "cross-reference to unknown atlas path {:?}",
                    path
                )));
            }
        }
        if let Some(hash) = content_hash {
            if !state.content.contains(hash) {
                return Err(Error::InvalidKey(format!(
                    "cross-reference to unknown content hash {:?}",
                    hash
                )));
            }
        }
        if let Some(key) = coordinate_key {
            if !state.coordinate.contains(key) {
                return Err(Error::InvalidKey(format!(
                    "cross-reference to unknown coordinate key {:?}",
                    key
                )));
            }
        }

        let row = CrossReference {
            id: Uuid::new_v4(),
            atlas_path,
            content_hash: content_hash.map(String::from),
            coordinate_key: coordinate_key.map(String::from),
            reference_type: reference_type.to_string(),
            created_at: Utc::now(),
        };
        let record = JournalRecord::CrossRef(row.clone());

        self.journal.append(&record)?;
        state.apply(&record);
        drop(state);

        debug!(id = %row.id, reference_type, "Appended cross-reference");
        Ok(row.id)
    }

    /// All keys transitively linked to the given key, across namespaces
    pub fn resolve_linked(&self, key: &str) -> BTreeSet<LinkedKey> {
        let mut seeds = vec![key.to_string()];
        if let Ok(normalized) = atlas::normalize_path(key) {
            if normalized != key {
                seeds.push(normalized);
            }
        }
        let seed_refs: Vec<&str> = seeds.iter().map(String::as_str).collect();

        let state = self.state.read();
        state.crossrefs.resolve_linked(&seed_refs)
    }

    /// Occupancy report combining pool stats and per-namespace counts
    pub fn stats(&self) -> LatticeStats {
        let state = self.state.read();
        LatticeStats {
            pool: state.pool.stats(),
            atlas_entries: state.atlas.len(),
            content_entries: state.content.len(),
            coordinate_entries: state.coordinate.len(),
            cross_references: state.crossrefs.len(),
            cache: self.cache.stats(),
        }
    }

    /// Rewrite the journal from live state, dropping superseded records
    pub fn compact(&self) -> Result<()> {
        let state = self.state.write();
        let mut records = Vec::new();

        for entry in state.atlas.iter() {
            records.push(JournalRecord::AtlasPut {
                path: entry.path.clone(),
                layer: entry.layer,
                compressed: entry.compressed.clone(),
                checksum: entry.checksum,
            });
        }
        for entry in state.content.iter() {
            let (compressed, _) = state.pool.read(entry.slot_id).map_err(|_| {
                Error::Integrity(format!(
                    "content entry {:?} references dead {}",
                    entry.content_hash, entry.slot_id
                ))
            })?;
            let created_at = state
                .pool
                .get(entry.slot_id)
                .map(|s| s.created_at)
                .unwrap_or_else(Utc::now);
            records.push(JournalRecord::ContentPut {
                content_hash: entry.content_hash.clone(),
                slot_id: entry.slot_id,
                content_type: entry.content_type.clone(),
                compression_ratio: entry.compression_ratio,
                checksum: entry.checksum,
                compressed: compressed.to_vec(),
                created_at,
            });
        }
        for entry in state.coordinate.iter() {
            let (compressed, _) = state.pool.read(entry.slot_id).map_err(|_| {
                Error::Integrity(format!(
                    "coordinate entry {:?} references dead {}",
                    entry.coordinate_key, entry.slot_id
                ))
            })?;
            let created_at = state
                .pool
                .get(entry.slot_id)
                .map(|s| s.created_at)
                .unwrap_or_else(Utc::now);
            records.push(JournalRecord::CoordinatePut {
                coordinate_key: entry.coordinate_key.clone(),
                precision: entry.precision,
                slot_id: entry.slot_id,
                checksum: entry.checksum,
                temporal_start: entry.temporal_start,
                temporal_end: entry.temporal_end,
                compressed: compressed.to_vec(),
                created_at,
            });
        }
        for row in state.crossrefs.iter() {
            records.push(JournalRecord::CrossRef(row.clone()));
        }

        self.journal.rewrite(&records)
    }

    /// Test hook: flip a byte inside a live slot's compressed payload
    #[cfg(test)]
    fn corrupt_slot(&self, slot_id: SlotId) {
        let mut state = self.state.write();
        let slot = state.pool.slot_mut(slot_id).expect("slot exists");
        let payload = slot.compressed.as_mut().expect("slot is live");
        payload[0] ^= 0x01;
    }

    /// Test hook: flip a byte inside a live atlas entry's payload
    #[cfg(test)]
    fn corrupt_atlas(&self, path: &str) {
        let mut state = self.state.write();
        let entry = state.atlas.entry_mut(path).expect("entry exists");
        entry.compressed[0] ^= 0x01;
    }
}

fn cache_key(mode: AddressMode, canonical: &str) -> String {
    format!("{}:{}", mode, canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_lattice(name: &str) -> (std::path::PathBuf, SphereLattice) {
        let dir = std::env::temp_dir().join(format!("lattice_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let lattice = SphereLattice::with_defaults(&dir).expect("open lattice");
        (dir, lattice)
    }

    #[test]
    fn test_round_trip_all_modes() -> Result<()> {
        let (dir, lattice) = temp_lattice("roundtrip");

        let payload = b"the same payload in three namespaces".repeat(3);
        let atlas = lattice.store(AddressMode::Atlas, "maps/regions/hq", &payload)?;
        let content = lattice.store(AddressMode::Content, "sha256:feedbeef", &payload)?;
        let coordinate = lattice.store(AddressMode::Coordinate, "37.422000_-122.084100", &payload)?;

        assert_eq!(atlas.key, "maps/regions/hq");
        assert!(matches!(atlas.location, StoreLocation::AtlasPath(_)));
        assert!(matches!(content.location, StoreLocation::Slot(_)));
        assert!(matches!(coordinate.location, StoreLocation::Slot(_)));

        assert_eq!(lattice.retrieve(AddressMode::Atlas, "maps/regions/hq")?, payload);
        assert_eq!(
            lattice.retrieve(AddressMode::Content, "sha256:feedbeef")?,
            payload
        );
        assert_eq!(
            lattice.retrieve(AddressMode::Coordinate, "37.422000_-122.084100")?,
            payload
        );

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_atlas_path_normalization_on_both_sides() -> Result<()> {
        let (dir, lattice) = temp_lattice("normalize");

        lattice.store(AddressMode::Atlas, "/maps//hq/", b"here")?;
        assert_eq!(lattice.retrieve(AddressMode::Atlas, "maps/hq")?, b"here");

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_content_idempotent_upsert() -> Result<()> {
        let (dir, lattice) = temp_lattice("idempotent");

        let first = lattice.store(AddressMode::Content, "h1", b"first payload")?;
        let second = lattice.store(AddressMode::Content, "h1", b"second payload")?;

        // Same slot, one entry, second payload wins
        assert_eq!(first.location, second.location);
        let stats = lattice.stats();
        assert_eq!(stats.content_entries, 1);
        assert_eq!(stats.pool.occupied, 1);
        assert_eq!(
            lattice.retrieve(AddressMode::Content, "h1")?,
            b"second payload"
        );

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_coordinate_precision_distinct_entries() -> Result<()> {
        let (dir, lattice) = temp_lattice("precision");

        lattice.store(AddressMode::Coordinate, "37.422000_-122.084100", b"hq")?;
        assert_eq!(
            lattice.retrieve(AddressMode::Coordinate, "37.422000_-122.084100")?,
            b"hq"
        );

        // Same raw coordinate at precision 4 is a distinct entry
        lattice.store(AddressMode::Coordinate, "37.4220_-122.0841", b"hq-coarse")?;
        assert_eq!(
            lattice.retrieve(AddressMode::Coordinate, "37.4220_-122.0841")?,
            b"hq-coarse"
        );
        assert_eq!(
            lattice.retrieve(AddressMode::Coordinate, "37.422000_-122.084100")?,
            b"hq"
        );
        assert_eq!(lattice.stats().coordinate_entries, 2);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_retrieve_unknown_key() {
        let (dir, lattice) = temp_lattice("missing");

        assert!(matches!(
            lattice.retrieve(AddressMode::Atlas, "no/such/path"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            lattice.retrieve(AddressMode::Content, "missing"),
            Err(Error::NotFound(_))
        ));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corruption_fails_closed() -> Result<()> {
        let (dir, lattice) = temp_lattice("corrupt");

        let receipt = lattice.store(AddressMode::Content, "h1", b"pristine")?;
        let slot_id = match receipt.location {
            StoreLocation::Slot(id) => id,
            other => panic!("unexpected location: {:?}", other),
        };
        lattice.corrupt_slot(slot_id);

        assert!(matches!(
            lattice.retrieve(AddressMode::Content, "h1"),
            Err(Error::Integrity(_))
        ));

        lattice.store(AddressMode::Atlas, "a/b", b"pristine")?;
        lattice.corrupt_atlas("a/b");
        assert!(matches!(
            lattice.retrieve(AddressMode::Atlas, "a/b"),
            Err(Error::Integrity(_))
        ));

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_cache_serves_second_read_and_store_invalidates() -> Result<()> {
        let (dir, lattice) = temp_lattice("cache");

        lattice.store(AddressMode::Content, "h1", b"v1")?;
        assert_eq!(lattice.retrieve(AddressMode::Content, "h1")?, b"v1");
        assert_eq!(lattice.retrieve(AddressMode::Content, "h1")?, b"v1");
        assert!(lattice.stats().cache.hits >= 1);

        lattice.store(AddressMode::Content, "h1", b"v2")?;
        assert_eq!(lattice.retrieve(AddressMode::Content, "h1")?, b"v2");

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_link_and_resolve() -> Result<()> {
        let (dir, lattice) = temp_lattice("link");

        lattice.store(AddressMode::Atlas, "maps/hq", b"payload")?;
        lattice.store(AddressMode::Content, "hashB", b"payload")?;
        lattice.link(Some("maps/hq"), Some("hashB"), None, "alias")?;

        let from_path = lattice.resolve_linked("maps/hq");
        assert!(from_path.contains(&LinkedKey::Content("hashB".to_string())));
        let from_hash = lattice.resolve_linked("hashB");
        assert!(from_hash.contains(&LinkedKey::Atlas("maps/hq".to_string())));

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_link_validates_keys() -> Result<()> {
        let (dir, lattice) = temp_lattice("linkvalidate");

        assert!(matches!(
            lattice.link(None, None, None, "alias"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            lattice.link(Some("never/stored"), None, None, "alias"),
            Err(Error::InvalidKey(_))
        ));

        lattice.store(AddressMode::Content, "h1", b"x")?;
        assert!(lattice.link(None, Some("h1"), None, "self").is_ok());

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_capacity_disabled_growth() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("lattice_capacity_{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let config = LatticeConfig {
            slot_capacity: 2,
            allow_growth: false,
            ..LatticeConfig::default()
        };
        let lattice = SphereLattice::open(&dir, config)?;

        lattice.store(AddressMode::Content, "h1", b"a")?;
        lattice.store(AddressMode::Content, "h2", b"b")?;
        assert!(matches!(
            lattice.store(AddressMode::Content, "h3", b"c"),
            Err(Error::Capacity(_))
        ));

        // Atlas addressing never competes for pool slots
        lattice.store(AddressMode::Atlas, "still/fits", b"d")?;
        // Idempotent re-store of an existing hash still works
        lattice.store(AddressMode::Content, "h1", b"a2")?;

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_stats_shape() -> Result<()> {
        let (dir, lattice) = temp_lattice("stats");

        lattice.store(AddressMode::Atlas, "a/b/c", b"x")?;
        lattice.store(AddressMode::Content, "h1", b"y")?;
        lattice.store(AddressMode::Coordinate, "1.000000_2.000000", b"z")?;

        let stats = lattice.stats();
        assert_eq!(stats.atlas_entries, 1);
        assert_eq!(stats.content_entries, 1);
        assert_eq!(stats.coordinate_entries, 1);
        assert_eq!(stats.pool.total, 2);
        assert_eq!(stats.pool.occupied, 2);
        assert_eq!(stats.pool.layer_histogram[0], 2);

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }

    #[test]
    fn test_empty_payload_round_trip() -> Result<()> {
        let (dir, lattice) = temp_lattice("empty");

        let receipt = lattice.store(AddressMode::Content, "h-empty", b"")?;
        assert_eq!(receipt.compression_ratio, 1.0);
        assert_eq!(lattice.retrieve(AddressMode::Content, "h-empty")?, b"");

        std::fs::remove_dir_all(dir).ok();
        Ok(())
    }
}
