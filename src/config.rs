//! Lattice configuration
//!
//! Policy knobs for the storage engine: pool capacity and growth, coordinate
//! key precision, compression level, cache size. Loadable from a TOML file;
//! every field has a default so a partial file is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Classic pool configuration: 108 slots before the growth policy applies.
pub const DEFAULT_SLOT_CAPACITY: usize = 108;

/// Default decimal precision for coordinate keys.
pub const DEFAULT_COORDINATE_PRECISION: u8 = 6;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Slot count before the pool is considered full
    pub slot_capacity: usize,
    /// Whether the pool may grow past `slot_capacity`
    pub allow_growth: bool,
    /// Decimal precision used when building coordinate keys
    pub coordinate_precision: u8,
    /// Zstd compression level
    pub compression_level: i32,
    /// Capacity of the decompressed-payload cache
    pub cache_capacity: usize,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            allow_growth: true,
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            compression_level: 3,
            cache_capacity: 1000,
        }
    }
}

impl LatticeConfig {
    /// Load a configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        let config: LatticeConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.slot_capacity == 0 {
            return Err(Error::Config("slot_capacity must be at least 1".to_string()));
        }
        if self.coordinate_precision == 0 {
            return Err(Error::Config(
                "coordinate_precision must be at least 1".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LatticeConfig::default();
        assert_eq!(config.slot_capacity, 108);
        assert!(config.allow_growth);
        assert_eq!(config.coordinate_precision, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: LatticeConfig = toml::from_str("slot_capacity = 16\nallow_growth = false\n")
            .expect("partial config should parse");
        assert_eq!(config.slot_capacity, 16);
        assert!(!config.allow_growth);
        // Unspecified fields fall back to defaults
        assert_eq!(config.coordinate_precision, 6);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = LatticeConfig {
            slot_capacity: 0,
            ..LatticeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
