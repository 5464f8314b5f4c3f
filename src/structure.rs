//! Shared-medium sub-networks (buses and crossbars).
//!
//! A [`Structure`] occupies exactly one cell of the base mesh (its
//! *wrapper*) but contributes `size` endpoints to the platform's address
//! space. Buses and crossbars are laid out identically; the kind is only
//! recorded for the simulator's platform summary.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};
use crate::types::CellIndex;

/// Index of an embedded structure within its platform, in embedding order.
pub type StructureId = usize;

/// The kind of shared-medium structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Bus,
    Crossbar,
}

impl std::fmt::Display for StructureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureKind::Bus => write!(f, "Bus"),
            StructureKind::Crossbar => write!(f, "Crossbar"),
        }
    }
}

/// A bus or crossbar with a fixed number of endpoint slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    kind: StructureKind,
    size: usize,
    cell: Option<CellIndex>,
}

impl Structure {
    /// Creates a structure with `size` endpoint slots (`size >= 1`).
    pub fn new(kind: StructureKind, size: usize) -> FlowResult<Self> {
        if size == 0 {
            return Err(FlowError::EmptyStructure);
        }
        Ok(Self {
            kind,
            size,
            cell: None,
        })
    }

    /// Shorthand for a bus with `size` endpoints.
    pub fn bus(size: usize) -> FlowResult<Self> {
        Self::new(StructureKind::Bus, size)
    }

    /// Shorthand for a crossbar with `size` endpoints.
    pub fn crossbar(size: usize) -> FlowResult<Self> {
        Self::new(StructureKind::Crossbar, size)
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    /// Number of endpoint slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots beyond the first, which have no mesh cell of their own.
    pub fn overflow_slots(&self) -> usize {
        self.size - 1
    }

    /// Flattened base-mesh index of the wrapper, once embedded.
    pub fn cell(&self) -> Option<CellIndex> {
        self.cell
    }

    pub(crate) fn place_at(&mut self, cell: CellIndex) {
        self.cell = Some(cell);
    }
}
