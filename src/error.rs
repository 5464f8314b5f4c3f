//! Error types for platform composition and file generation.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Address, AppId, MeshCell, ThreadId};

/// Errors raised by the composition engine.
///
/// Every variant is fatal for a run: the pipeline stops before any output
/// is written (or, for write failures, at the failing file).
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("base mesh must be at least 1x1, got {width}x{height}")]
    InvalidMesh { width: usize, height: usize },

    #[error("reference clock of {mhz} MHz yields a zero injector clock period")]
    DegenerateClock { mhz: u32 },

    #[error("structure must contain at least one endpoint")]
    EmptyStructure,

    #[error("cell {cell} lies outside the {width}x{height} base mesh")]
    CellOutOfBounds {
        cell: MeshCell,
        width: usize,
        height: usize,
    },

    #[error("there already is a wrapper at cell {cell}")]
    DuplicateWrapper { cell: MeshCell },

    #[error("bandwidth {value} Mbps is not a finite, non-negative number")]
    InvalidBandwidth { value: f64 },

    #[error("unknown thread {thread} in application {app}")]
    UnknownThread { app: AppId, thread: ThreadId },

    #[error("allocation address {address} exceeds the platform's {total} endpoints")]
    AddressOutOfRange { address: Address, total: usize },

    #[error("target thread {thread} of application {app} has no allocated address")]
    UnresolvedTarget { app: AppId, thread: ThreadId },

    #[error("cannot create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for composition operations.
pub type FlowResult<T> = Result<T, FlowError>;
