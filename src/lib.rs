//! # nocflow
//!
//! Traffic-flow generator for hybrid Network-on-Chip platforms.
//!
//! A hybrid platform is a 2D base mesh in which some cells are replaced by
//! the *wrapper* of a bus or crossbar that hosts several endpoints. Given
//! a communication graph of applications and threads, a composed platform
//! and an allocation of threads to endpoint addresses, the crate derives
//! the per-endpoint and per-injector JSON documents a cycle-accurate NoC
//! simulator consumes.
//!
//! ## Pipeline
//!
//! 1. Build a [`CommGraph`] by hand or from [`registry`] presets.
//! 2. Create a [`Platform`] and [`Platform::embed`] buses and crossbars.
//!    Every embed recomputes the square address layout.
//! 3. Install an [`AllocationMap`] binding threads to addresses.
//! 4. [`Platform::derive`] the endpoint and injector records.
//! 5. [`emit::write_all`] the documents to an output directory.
//!
//! ## Features
//!
//! - `parallel` - Derive per-address records on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use nocflow::{AllocationMap, CommGraph, FixedSeeds, Platform, Structure};
//!
//! let mut graph = CommGraph::new();
//! let app = graph.add_application("demo");
//! let src = graph.add_thread(app, Some("src")).unwrap();
//! let dst = graph.add_thread(app, Some("dst")).unwrap();
//! graph.add_target(src, dst, 128.0).unwrap();
//!
//! let mut platform = Platform::new(2, 2, 25).unwrap();
//! platform.embed(Structure::crossbar(4).unwrap(), (1, 1)).unwrap();
//!
//! let allocation = AllocationMap::new().with(0, src).with(6, dst);
//! platform.install_allocation(&graph, allocation).unwrap();
//!
//! let tables = platform.derive(&graph, &mut FixedSeeds(7)).unwrap();
//! assert_eq!(tables.len(), 7);
//! ```
//!
//! ## Configuration-Driven Setup
//!
//! ```rust,ignore
//! use nocflow::config::GenerationConfig;
//! use nocflow::registry::create_default_registry;
//!
//! let config = GenerationConfig::from_file("setups/H16_25.yaml")?;
//! let composition = config.build(&create_default_registry())?;
//! ```

pub mod types;
pub mod error;
pub mod graph;
pub mod structure;
pub mod layout;
pub mod allocation;
pub mod derive;
pub mod platform;
pub mod wire;
pub mod emit;
pub mod config;
pub mod registry;
pub mod report;
pub mod latency;

// Re-export commonly used types
pub use types::{Address, AppId, MeshCell, Mbps, ThreadId};
pub use error::{FlowError, FlowResult};
pub use graph::{CommGraph, ThreadRef};
pub use structure::{Structure, StructureKind};
pub use layout::{AddressLayout, Cell, EndpointSite};
pub use allocation::AllocationMap;
pub use derive::{DerivedTables, FixedSeeds, RandomSeeds, SeedSource};
pub use platform::Platform;
pub use emit::{write_all, EmitReport};
pub use config::{Composition, ConfigError, GenerationConfig, GenerationConfigBuilder};
pub use registry::{create_default_registry, AppRegistry};
pub use report::RunSummary;
pub use latency::{LatencyError, LatencyReport};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Example
///
/// ```rust,ignore
/// nocflow::init_logging("info");
/// ```
pub fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
