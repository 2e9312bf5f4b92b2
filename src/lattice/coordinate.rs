//! Quantized geocoordinate index backed by the slot pool
//!
//! Coordinate keys are the canonical string `"{lat:.P}_{lon:.P}"` for a
//! precision P. Canonicalization is fixed-point formatting: a key is valid
//! only if re-formatting its parsed coordinates at its own precision
//! reproduces it byte for byte, so repeated stores at the same nominal
//! coordinate and precision always hit the same entry. The same raw
//! coordinate at two precisions is two distinct entries.

use super::integrity::Digest;
use super::slot::SlotId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A coordinate-addressed index row
#[derive(Debug, Clone)]
pub struct CoordinateEntry {
    /// Canonical key, unique per (lat, lon, precision)
    pub coordinate_key: String,
    /// Decimal precision the key was quantized at
    pub precision: u8,
    /// Pool slot holding the compressed payload
    pub slot_id: SlotId,
    /// When this entry was first created; survives idempotent re-stores
    pub temporal_start: DateTime<Utc>,
    /// Unset while the entry remains current
    pub temporal_end: Option<DateTime<Utc>>,
    /// Checksum over the compressed payload, mirrors the slot's
    pub checksum: Digest,
}

/// Build the canonical key for a coordinate at the given precision
pub fn coordinate_key(lat: f64, lon: f64, precision: u8) -> String {
    let p = precision as usize;
    format!("{:.p$}_{:.p$}", lat, lon, p = p)
}

fn decimal_count(part: &str) -> Option<usize> {
    let (_, fraction) = part.split_once('.')?;
    if fraction.is_empty() {
        None
    } else {
        Some(fraction.len())
    }
}

/// Parse and validate a coordinate key, returning `(lat, lon, precision)`
pub fn parse_key(key: &str) -> Result<(f64, f64, u8)> {
    let malformed = || Error::InvalidKey(format!("malformed coordinate key {:?}", key));

    let (lat_part, lon_part) = key.split_once('_').ok_or_else(malformed)?;
    let lat_decimals = decimal_count(lat_part).ok_or_else(malformed)?;
    let lon_decimals = decimal_count(lon_part).ok_or_else(malformed)?;
    if lat_decimals != lon_decimals || lat_decimals > u8::MAX as usize {
        return Err(malformed());
    }
    let precision = lat_decimals as u8;

    let lat: f64 = lat_part.parse().map_err(|_| malformed())?;
    let lon: f64 = lon_part.parse().map_err(|_| malformed())?;
    if !lat.is_finite() || !lon.is_finite() {
        return Err(malformed());
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidKey(format!(
            "latitude {} out of range in key {:?}",
            lat, key
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidKey(format!(
            "longitude {} out of range in key {:?}",
            lon, key
        )));
    }

    // The key must already be in canonical fixed-point form
    if coordinate_key(lat, lon, precision) != key {
        return Err(Error::InvalidKey(format!(
            "coordinate key {:?} is not in canonical form",
            key
        )));
    }

    Ok((lat, lon, precision))
}

/// Coordinate-keyed entry table
#[derive(Debug, Default)]
pub struct CoordinateIndex {
    entries: HashMap<String, CoordinateEntry>,
}

impl CoordinateIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its canonical key
    pub fn upsert(&mut self, entry: CoordinateEntry) {
        self.entries.insert(entry.coordinate_key.clone(), entry);
    }

    /// Look up an entry by canonical key
    pub fn get(&self, key: &str) -> Option<&CoordinateEntry> {
        self.entries.get(key)
    }

    /// Slot currently backing a key, if any
    pub fn slot_of(&self, key: &str) -> Option<SlotId> {
        self.entries.get(key).map(|e| e.slot_id)
    }

    /// Whether a key resolves
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
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
    pub fn iter(&self) -> impl Iterator<Item = &CoordinateEntry> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_key_formatting() {
        assert_eq!(coordinate_key(37.422, -122.0841, 6), "37.422000_-122.084100");
        assert_eq!(coordinate_key(37.422, -122.0841, 4), "37.4220_-122.0841");
        assert_eq!(coordinate_key(0.0, 0.0, 2), "0.00_0.00");
    }

    #[test]
    fn test_parse_canonical_keys() -> Result<()> {
        let (lat, lon, precision) = parse_key("37.422000_-122.084100")?;
        assert_eq!(precision, 6);
        assert!((lat - 37.422).abs() < 1e-9);
        assert!((lon + 122.0841).abs() < 1e-9);

        // Precision is part of identity
        let (_, _, p4) = parse_key("37.4220_-122.0841")?;
        assert_eq!(p4, 4);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for key in [
            "",
            "37.422000",
            "37_122",
            "37._122.0",
            "37.42_-122.084",
            "+37.0_0.0",
            "37,0_0,0",
            "nan_0.000000",
            "abc.def_0.0",
        ] {
            assert!(
                matches!(parse_key(key), Err(Error::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            parse_key("91.000000_0.000000"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            parse_key("0.000000_180.500000"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_key_round_trips_through_parse() -> Result<()> {
        let key = coordinate_key(-33.8688, 151.2093, 6);
        let (lat, lon, precision) = parse_key(&key)?;
        assert_eq!(coordinate_key(lat, lon, precision), key);
        Ok(())
    }
}
