//! Compression codec for lattice payloads

use crate::error::{Error, Result};
use std::io::Write;

/// Compress payload bytes with zstd at the given level
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut encoder = zstd::Encoder::new(Vec::new(), level)
        .map_err(|e| Error::Compression(format!("Failed to create zstd encoder: {}", e)))?;
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(format!("Failed to compress: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(format!("Failed to finish compression: {}", e)))
}

/// Decompress a payload previously produced by [`compress`]
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| Error::Compression(format!("Failed to decompress: {}", e)))
}

/// Compression ratio, compressed ÷ original; 1.0 for an empty original
pub fn ratio(original_size: usize, compressed_size: usize) -> f64 {
    if original_size > 0 {
        compressed_size as f64 / original_size as f64
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() -> Result<()> {
        let data = b"Hello, Lattice! This is a compression round trip. ".repeat(10);
        let compressed = compress(&data, 3)?;

        // Compression should reduce size for repetitive data
        assert!(compressed.len() < data.len());

        let decompressed = decompress(&compressed)?;
        assert_eq!(decompressed, data);
        Ok(())
    }

    #[test]
    fn test_round_trip_empty() -> Result<()> {
        let compressed = compress(b"", 3)?;
        let decompressed = decompress(&compressed)?;
        assert!(decompressed.is_empty());
        Ok(())
    }

    #[test]
    fn test_decompress_malformed() {
        let result = decompress(b"definitely not a zstd frame");
        assert!(matches!(result, Err(Error::Compression(_))));
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1000, 250), 0.25);
        assert_eq!(ratio(0, 13), 1.0);
    }
}
