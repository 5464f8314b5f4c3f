//! Core type definitions for platform composition.
//!
//! This module defines the identifiers and coordinates shared by the
//! graph, layout, derivation and wire layers.

use serde::{Deserialize, Serialize};

/// Linear endpoint address (`PEPos` in the generated files).
///
/// Every endpoint of a composed platform, whether a standalone mesh cell or
/// a slot inside a bus/crossbar, owns exactly one address in `0..total`.
pub type Address = usize;

/// Sequential application identifier, assigned at registration time.
pub type AppId = u32;

/// Sequential thread identifier within its application.
pub type ThreadId = u32;

/// Flattened (row-major) index of a cell in the base mesh.
pub type CellIndex = usize;

/// Bandwidth in Megabits/second. May be fractional.
pub type Mbps = f64;

/// A position in the base mesh.
///
/// `x` is the column (`0..width`) and `y` is the row (`0..height`); the
/// row-major index of the cell is `y * width + x`. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct MeshCell {
    pub x: usize,
    pub y: usize,
}

impl MeshCell {
    /// Creates a cell at column `x`, row `y`.
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns the row-major index of this cell in a mesh of the given width.
    pub fn index(&self, width: usize) -> CellIndex {
        self.y * width + self.x
    }

    /// Inverse of [`MeshCell::index`].
    pub fn from_index(index: CellIndex, width: usize) -> Self {
        Self {
            x: index % width,
            y: index / width,
        }
    }
}

impl From<(usize, usize)> for MeshCell {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

impl From<MeshCell> for (usize, usize) {
    fn from(cell: MeshCell) -> Self {
        (cell.x, cell.y)
    }
}

impl std::fmt::Display for MeshCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
