// Sphere Lattice - Rust Implementation
// A multi-modal addressable storage lattice

#![warn(rust_2018_idioms)]

pub mod config;
pub mod lattice;

// Re-exports for convenience
pub use config::LatticeConfig;
pub use lattice::{
    AddressMode, LatticeStats, LinkedKey, SphereLattice, StoreLocation, StoreReceipt,
};

/// Sphere lattice error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Not found: {0}")]
        NotFound(String),

        #[error("Integrity failure: {0}")]
        Integrity(String),

        #[error("Invalid key: {0}")]
        InvalidKey(String),

        #[error("Capacity exhausted: {0}")]
        Capacity(String),

        #[error("Compression error: {0}")]
        Compression(String),

        #[error("Journal error: {0}")]
        Journal(String),

        #[error("Config error: {0}")]
        Config(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_format() {
        let _version: &str = VERSION;
    }
}
