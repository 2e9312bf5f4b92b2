//! Sphere Lattice control binary
//!
//! Command-line interface over the lattice facade:
//! - Store and retrieve payloads in any addressing mode
//! - Cross-reference entries across namespaces
//! - Occupancy statistics and journal compaction
//!
//! # Examples
//!
//! ```bash
//! # Store a file under a hierarchical path
//! latticectl store atlas maps/regions/hq --input hq.bin
//!
//! # Store at a coordinate (key built from lat/lon at configured precision)
//! latticectl store-coordinate 37.422 -122.0841 --input hq.bin
//!
//! # Retrieve by content hash
//! latticectl retrieve content sha256:feedbeef --output payload.bin
//!
//! # Link a path and a hash that hold the same logical payload
//! latticectl link --atlas maps/regions/hq --content sha256:feedbeef alias
//!
//! # Show occupancy
//! latticectl stats
//! ```

use clap::{Parser, Subcommand};
use sphere_lattice::lattice::coordinate;
use sphere_lattice::{AddressMode, LatticeConfig, SphereLattice};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sphere Lattice - multi-modal addressable storage
#[derive(Parser, Debug)]
#[command(name = "latticectl")]
#[command(version = sphere_lattice::VERSION)]
#[command(about = "Sphere Lattice - multi-modal addressable storage", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Data directory path
    #[arg(long, global = true, default_value = "data/lattice", env = "LATTICE_DATA")]
    data_dir: PathBuf,

    /// Optional TOML config file
    #[arg(long, global = true, env = "LATTICE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a payload under a mode and key
    Store {
        /// Addressing mode (atlas, content, coordinate)
        mode: AddressMode,
        /// Key: path, content hash, or canonical coordinate key
        key: String,
        /// Read the payload from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Store a payload at a coordinate, building the canonical key
    StoreCoordinate {
        /// Latitude in degrees
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in degrees
        #[arg(allow_hyphen_values = true)]
        lon: f64,
        /// Read the payload from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Override the configured key precision
        #[arg(short, long)]
        precision: Option<u8>,
    },

    /// Retrieve a payload by mode and key
    Retrieve {
        /// Addressing mode (atlas, content, coordinate)
        mode: AddressMode,
        /// Key: path, content hash, or canonical coordinate key
        key: String,
        /// Write the payload to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cross-reference entries across namespaces
    Link {
        /// Relation label, e.g. "alias"
        reference_type: String,
        /// Atlas path participating in the link
        #[arg(long)]
        atlas: Option<String>,
        /// Content hash participating in the link
        #[arg(long)]
        content: Option<String>,
        /// Coordinate key participating in the link
        #[arg(long)]
        coordinate: Option<String>,
    },

    /// Show all keys linked to the given key
    Resolve {
        /// Key in any namespace
        key: String,
    },

    /// Show occupancy statistics
    Stats,

    /// Rewrite the journal, dropping superseded records
    Compact,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    let config = match &cli.config {
        Some(path) => LatticeConfig::from_file(path)?,
        None => LatticeConfig::default(),
    };
    let precision = config.coordinate_precision;
    let lattice = SphereLattice::open(&cli.data_dir, config)?;

    match cli.command {
        Commands::Store { mode, key, input } => {
            let data = read_payload(input.as_deref())?;
            let receipt = lattice.store(mode, &key, &data)?;
            info!(key = %receipt.key, "Stored");
            println!("key:      {}", receipt.key);
            println!("checksum: {}", receipt.checksum);
            println!("ratio:    {:.3}", receipt.compression_ratio);
            Ok(())
        }
        Commands::StoreCoordinate {
            lat,
            lon,
            input,
            precision: override_precision,
        } => {
            let key = coordinate::coordinate_key(lat, lon, override_precision.unwrap_or(precision));
            let data = read_payload(input.as_deref())?;
            let receipt = lattice.store(AddressMode::Coordinate, &key, &data)?;
            println!("key:      {}", receipt.key);
            println!("checksum: {}", receipt.checksum);
            println!("ratio:    {:.3}", receipt.compression_ratio);
            Ok(())
        }
        Commands::Retrieve { mode, key, output } => {
            let data = lattice.retrieve(mode, &key)?;
            match output {
                Some(path) => std::fs::write(path, &data)?,
                None => std::io::stdout().write_all(&data)?,
            }
            Ok(())
        }
        Commands::Link {
            reference_type,
            atlas,
            content,
            coordinate,
        } => {
            let id = lattice.link(
                atlas.as_deref(),
                content.as_deref(),
                coordinate.as_deref(),
                &reference_type,
            )?;
            println!("reference: {}", id);
            Ok(())
        }
        Commands::Resolve { key } => {
            let related = lattice.resolve_linked(&key);
            if related.is_empty() {
                println!("No linked keys.");
            } else {
                for linked in related {
                    println!("{}", linked);
                }
            }
            Ok(())
        }
        Commands::Stats => {
            let stats = lattice.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Compact => {
            lattice.compact()?;
            println!("Journal compacted.");
            Ok(())
        }
    }
}

/// Read the payload from a file, or stdin when no file is given
fn read_payload(input: Option<&std::path::Path>) -> anyhow::Result<Vec<u8>> {
    match input {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data)?;
            Ok(data)
        }
    }
}
