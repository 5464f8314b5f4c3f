//! Square-layout address assignment.
//!
//! Given the base mesh and the structures embedded in it, [`compute`]
//! produces a fresh [`AddressLayout`]: one linear address per endpoint and,
//! for every address, the base-mesh cell it belongs to.
//!
//! # Algorithm
//!
//! Let `total` be the endpoint count and `bound = ceil(sqrt(total))`, the
//! side of the smallest square able to index every address.
//!
//! 1. **Primary pass**: cells are walked in row-major order. A standalone
//!    cell takes its own row-major index as address; a wrapper cell hands
//!    that address to the first slot of its structure.
//! 2. **Overflow pass**: slots `1..size` of each structure have no cell of
//!    their own. They are packed into the part of the `bound x bound`
//!    square beyond the base footprint (addresses `>= width * height`) by a
//!    single sweep that hands out consecutive addresses, visiting owners in
//!    row-major cell order and their slots in order.
//!
//! The layout is always rebuilt from scratch, never patched.

use crate::structure::{Structure, StructureId};
use crate::types::{Address, CellIndex};

/// Contents of one base-mesh cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cell {
    /// A single standalone endpoint
    Standalone,
    /// Wrapper of the given embedded structure
    Wrapper(StructureId),
}

/// What lives at an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointSite {
    /// A standalone endpoint occupying a base-mesh cell
    Standalone { cell: CellIndex },
    /// Slot `slot` of structure `structure`, wrapped at `cell`
    Slot {
        structure: StructureId,
        slot: usize,
        cell: CellIndex,
    },
}

impl EndpointSite {
    /// Base-mesh cell this endpoint maps back to.
    pub fn cell(&self) -> CellIndex {
        match *self {
            EndpointSite::Standalone { cell } => cell,
            EndpointSite::Slot { cell, .. } => cell,
        }
    }
}

/// Result of a layout pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressLayout {
    bound: usize,
    sites: Vec<EndpointSite>,
    slot_addresses: Vec<Vec<Address>>,
}

impl AddressLayout {
    /// Side of the square address grid.
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Number of addresses (`0..len()` are all assigned).
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Endpoint table indexed by address.
    pub fn sites(&self) -> &[EndpointSite] {
        &self.sites
    }

    pub fn site(&self, address: Address) -> Option<&EndpointSite> {
        self.sites.get(address)
    }

    /// Wrapper-address table: base-mesh cell index for each address.
    pub fn wrapper_addresses(&self) -> Vec<CellIndex> {
        self.sites.iter().map(EndpointSite::cell).collect()
    }

    /// Addresses of every slot of a structure, in slot order.
    pub fn structure_addresses(&self, id: StructureId) -> Option<&[Address]> {
        self.slot_addresses.get(id).map(Vec::as_slice)
    }
}

/// Smallest `n` with `n * n >= total`. The float estimate is corrected in
/// integer arithmetic.
pub fn square_bound(total: usize) -> usize {
    let mut bound = (total as f64).sqrt() as usize;
    while bound * bound < total {
        bound += 1;
    }
    while bound > 0 && (bound - 1) * (bound - 1) >= total {
        bound -= 1;
    }
    bound
}

/// Hands out overflow addresses in sweep order.
///
/// The sweep starts right after the base footprint and never revisits an
/// address, so every overflow slot receives a distinct one.
#[derive(Debug)]
struct OverflowSweep {
    next: Address,
    end: Address,
}

impl OverflowSweep {
    fn new(footprint: usize, total: usize) -> Self {
        Self {
            next: footprint,
            end: total,
        }
    }
}

impl Iterator for OverflowSweep {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        if self.next >= self.end {
            return None;
        }
        let address = self.next;
        self.next += 1;
        Some(address)
    }
}

/// Computes the layout for a `width x height` mesh.
///
/// `cells` must hold `width * height` entries in row-major order, and every
/// `Cell::Wrapper(id)` must index into `structures`.
pub fn compute(width: usize, height: usize, cells: &[Cell], structures: &[Structure]) -> AddressLayout {
    let footprint = width * height;
    debug_assert_eq!(cells.len(), footprint);

    let total = footprint + structures.iter().map(Structure::overflow_slots).sum::<usize>();
    let bound = square_bound(total);

    let mut sites = Vec::with_capacity(total);
    let mut slot_addresses: Vec<Vec<Address>> = structures
        .iter()
        .map(|s| Vec::with_capacity(s.size()))
        .collect();

    // Primary pass: address == row-major cell index.
    for (index, cell) in cells.iter().enumerate() {
        match *cell {
            Cell::Standalone => sites.push(EndpointSite::Standalone { cell: index }),
            Cell::Wrapper(structure) => {
                sites.push(EndpointSite::Slot {
                    structure,
                    slot: 0,
                    cell: index,
                });
                slot_addresses[structure].push(index);
            }
        }
    }

    // Overflow pass.
    let mut sweep = OverflowSweep::new(footprint, total);
    for (index, cell) in cells.iter().enumerate() {
        let Cell::Wrapper(structure) = *cell else {
            continue;
        };
        for slot in 1..structures[structure].size() {
            let Some(address) = sweep.next() else {
                break;
            };
            debug_assert_eq!(address, sites.len());
            sites.push(EndpointSite::Slot {
                structure,
                slot,
                cell: index,
            });
            slot_addresses[structure].push(address);
        }
    }

    tracing::debug!(total, bound, footprint, "recomputed square layout");

    AddressLayout {
        bound,
        sites,
        slot_addresses,
    }
}
