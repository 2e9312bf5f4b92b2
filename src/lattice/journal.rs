//! Append-only lattice journal
//!
//! The sole persistence mechanism. Every store or link appends exactly one
//! framed record covering both the slot mutation and its index row, then
//! fsyncs, so an index row can never become durable without its payload.
//!
//! # Format
//!
//! ```text
//! Journal:
//! [4-byte length][json record][4-byte crc32]  ← atomic append
//! [4-byte length][json record][4-byte crc32]
//! ...
//! ```
//!
//! Recovery reads records sequentially, last write wins. A corrupt or
//! truncated tail stops replay with a warning; everything before it is
//! applied.

use super::crossref::CrossReference;
use super::integrity::Digest;
use super::slot::SlotId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Journal file name within the lattice directory
const JOURNAL_FILE: &str = "lattice.journal";

/// Payload bytes rendered as base64 strings inside json records
mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// One atomic unit of persisted work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalRecord {
    /// Atlas upsert; carries the payload directly (no slot involved)
    AtlasPut {
        path: String,
        layer: u8,
        #[serde(with = "b64")]
        compressed: Vec<u8>,
        checksum: Digest,
    },
    /// Content upsert: index row plus its slot write, one unit
    ContentPut {
        content_hash: String,
        slot_id: SlotId,
        content_type: String,
        compression_ratio: f64,
        checksum: Digest,
        #[serde(with = "b64")]
        compressed: Vec<u8>,
        created_at: DateTime<Utc>,
    },
    /// Coordinate upsert: index row plus its slot write, one unit
    CoordinatePut {
        coordinate_key: String,
        precision: u8,
        slot_id: SlotId,
        checksum: Digest,
        temporal_start: DateTime<Utc>,
        temporal_end: Option<DateTime<Utc>>,
        #[serde(with = "b64")]
        compressed: Vec<u8>,
        created_at: DateTime<Utc>,
    },
    /// Cross-reference append
    CrossRef(CrossReference),
}

impl JournalRecord {
    /// Serialize to a framed record: `[len][json][crc32]`
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::Journal(format!("Failed to serialize record: {}", e)))?;

        let mut framed = Vec::with_capacity(json.len() + 8);
        framed.extend_from_slice(&(json.len() as u32).to_le_bytes());
        framed.extend_from_slice(&json);
        framed.extend_from_slice(&crc32fast::hash(&json).to_le_bytes());
        Ok(framed)
    }

    /// Deserialize from a framed record
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::Journal("record frame too short".to_string()));
        }

        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if bytes.len() < len + 8 {
            return Err(Error::Journal(format!(
                "incomplete record: expected {} bytes, got {}",
                len + 8,
                bytes.len()
            )));
        }

        let json = &bytes[4..4 + len];
        let stored_crc = u32::from_le_bytes([
            bytes[4 + len],
            bytes[5 + len],
            bytes[6 + len],
            bytes[7 + len],
        ]);
        if crc32fast::hash(json) != stored_crc {
            return Err(Error::Journal("record frame checksum mismatch".to_string()));
        }

        serde_json::from_slice(json)
            .map_err(|e| Error::Journal(format!("Failed to deserialize record: {}", e)))
    }
}

/// Framed append-only record log
#[derive(Debug)]
pub struct Journal {
    log_path: PathBuf,
}

impl Journal {
    /// Open or create a journal in the given directory and replay it
    ///
    /// Returns the journal handle and the records recovered from disk, in
    /// append order.
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<(Self, Vec<JournalRecord>)> {
        let base_path = base_path.as_ref();
        std::fs::create_dir_all(base_path)
            .map_err(|e| Error::Journal(format!("Failed to create lattice directory: {}", e)))?;

        let journal = Self {
            log_path: base_path.join(JOURNAL_FILE),
        };
        let records = journal.replay()?;
        Ok((journal, records))
    }

    fn replay(&self) -> Result<Vec<JournalRecord>> {
        if !self.log_path.exists() {
            info!("No journal found, starting fresh");
            return Ok(Vec::new());
        }

        info!(path = ?self.log_path, "Replaying journal");

        let file = File::open(&self.log_path)
            .map_err(|e| Error::Journal(format!("Failed to open journal: {}", e)))?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    warn!("Error reading record length: {}", e);
                    break;
                }
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut framed = vec![0u8; len + 8];
            framed[0..4].copy_from_slice(&len_bytes);
            if let Err(e) = reader.read_exact(&mut framed[4..]) {
                warn!("Truncated journal tail: {}", e);
                break;
            }

            match JournalRecord::from_bytes(&framed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Corrupt journal tail: {}", e);
                    break;
                }
            }
        }

        info!(records = records.len(), "Journal replay complete");
        Ok(records)
    }

    /// Append one record and fsync
    pub fn append(&self, record: &JournalRecord) -> Result<()> {
        let bytes = record.to_bytes()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| Error::Journal(format!("Failed to open journal: {}", e)))?;

        file.write_all(&bytes)
            .map_err(|e| Error::Journal(format!("Failed to append record: {}", e)))?;
        file.sync_all()
            .map_err(|e| Error::Journal(format!("Failed to sync journal: {}", e)))?;

        debug!(bytes = bytes.len(), "Appended journal record");
        Ok(())
    }

    /// Replace the journal with the given records (compaction)
    ///
    /// Writes to a temp file, fsyncs, then renames over the old log.
    pub fn rewrite(&self, records: &[JournalRecord]) -> Result<()> {
        info!(records = records.len(), "Compacting journal");

        let temp_path = self.log_path.with_extension("journal.tmp");
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::Journal(format!("Failed to create temp journal: {}", e)))?;

        for record in records {
            let bytes = record.to_bytes()?;
            file.write_all(&bytes)
                .map_err(|e| Error::Journal(format!("Failed to write compacted record: {}", e)))?;
        }
        file.sync_all()
            .map_err(|e| Error::Journal(format!("Failed to sync compacted journal: {}", e)))?;

        std::fs::rename(&temp_path, &self.log_path)
            .map_err(|e| Error::Journal(format!("Failed to replace journal: {}", e)))?;

        info!("Journal compaction complete");
        Ok(())
    }

    /// Path of the on-disk log
    pub fn path(&self) -> &Path {
        &self.log_path
    }
}
