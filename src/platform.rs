//! Platform composition: base mesh, embedded structures and addressing.
//!
//! The [`Platform`] owns a `width x height` base mesh. Every cell starts as
//! a standalone endpoint; [`Platform::embed`] replaces a cell with the
//! wrapper of a bus or crossbar and recomputes the whole address layout.
//!
//! # Pipeline
//!
//! ```
//! use nocflow::allocation::AllocationMap;
//! use nocflow::derive::FixedSeeds;
//! use nocflow::graph::CommGraph;
//! use nocflow::platform::Platform;
//! use nocflow::structure::Structure;
//!
//! let mut graph = CommGraph::new();
//! let app = graph.add_application("demo");
//! let a = graph.add_thread(app, None).unwrap();
//! let b = graph.add_thread(app, None).unwrap();
//! graph.add_target(a, b, 64.0).unwrap();
//!
//! let mut platform = Platform::new(2, 2, 50).unwrap();
//! platform.embed(Structure::bus(3).unwrap(), (1, 0)).unwrap();
//! assert_eq!(platform.total_endpoints(), 6);
//!
//! platform
//!     .install_allocation(&graph, AllocationMap::new().with(0, a).with(5, b))
//!     .unwrap();
//! let tables = platform.derive(&graph, &mut FixedSeeds(1)).unwrap();
//! assert_eq!(tables.injectors[0].injection_rate, 100);
//! ```

use crate::allocation::AllocationMap;
use crate::derive::{self, injector_clock_period, DerivedTables, SeedSource};
use crate::error::{FlowError, FlowResult};
use crate::graph::CommGraph;
use crate::layout::{self, AddressLayout, Cell};
use crate::structure::{Structure, StructureId, StructureKind};
use crate::types::{Address, CellIndex, MeshCell};

/// A base mesh with embedded shared-medium structures.
#[derive(Clone, Debug)]
pub struct Platform {
    width: usize,
    height: usize,
    reference_clock_mhz: u32,
    clock_period: u32,
    cells: Vec<Cell>,
    structures: Vec<Structure>,
    layout: AddressLayout,
    allocation: AllocationMap,
    wrappers: usize,
    buses: usize,
    crossbars: usize,
    bus_sizes: Vec<usize>,
    crossbar_sizes: Vec<usize>,
}

impl Platform {
    /// Creates a platform with a `width x height` mesh of standalone
    /// endpoints, clocked at `reference_clock_mhz`.
    pub fn new(width: usize, height: usize, reference_clock_mhz: u32) -> FlowResult<Self> {
        if width == 0 || height == 0 {
            return Err(FlowError::InvalidMesh { width, height });
        }
        let clock_period = injector_clock_period(reference_clock_mhz)?;

        let cells = vec![Cell::Standalone; width * height];
        let layout = layout::compute(width, height, &cells, &[]);

        tracing::info!(
            width,
            height,
            reference_clock_mhz,
            clock_period,
            "created base mesh"
        );

        Ok(Self {
            width,
            height,
            reference_clock_mhz,
            clock_period,
            cells,
            structures: Vec::new(),
            layout,
            allocation: AllocationMap::new(),
            wrappers: 0,
            buses: 0,
            crossbars: 0,
            bus_sizes: Vec::new(),
            crossbar_sizes: Vec::new(),
        })
    }

    /// Embeds `structure` at `cell`, replacing that cell's standalone
    /// endpoint with the structure's wrapper.
    ///
    /// All addresses are recomputed: addresses obtained before this call
    /// must not be reused.
    pub fn embed(&mut self, mut structure: Structure, cell: impl Into<MeshCell>) -> FlowResult<StructureId> {
        let cell = cell.into();
        if cell.x >= self.width || cell.y >= self.height {
            return Err(FlowError::CellOutOfBounds {
                cell,
                width: self.width,
                height: self.height,
            });
        }

        let index = cell.index(self.width);
        if let Cell::Wrapper(_) = self.cells[index] {
            tracing::error!("There already is a wrapper at given location {}", cell);
            return Err(FlowError::DuplicateWrapper { cell });
        }

        let id = self.structures.len();
        self.wrappers += 1;
        match structure.kind() {
            StructureKind::Bus => {
                self.buses += 1;
                self.bus_sizes.push(structure.size());
            }
            StructureKind::Crossbar => {
                self.crossbars += 1;
                self.crossbar_sizes.push(structure.size());
            }
        }
        structure.place_at(index);
        tracing::debug!(
            kind = %structure.kind(),
            size = structure.size(),
            %cell,
            "embedding structure"
        );
        self.structures.push(structure);
        self.cells[index] = Cell::Wrapper(id);

        self.recompute_addresses();
        Ok(id)
    }

    /// Rebuilds the address layout from the current mesh.
    fn recompute_addresses(&mut self) {
        self.layout = layout::compute(self.width, self.height, &self.cells, &self.structures);
    }

    /// Installs the thread-to-address binding used by [`Platform::derive`].
    pub fn install_allocation(&mut self, graph: &CommGraph, allocation: AllocationMap) -> FlowResult<()> {
        allocation.validate(graph, self.total_endpoints())?;
        tracing::info!(
            bound = allocation.len(),
            total = self.total_endpoints(),
            "installed allocation map"
        );
        self.allocation = allocation;
        Ok(())
    }

    /// Derives endpoint and injector records for every address.
    ///
    /// The allocation is re-checked against the current endpoint count, so
    /// embedding after installation cannot leave dangling addresses.
    pub fn derive(&self, graph: &CommGraph, seeds: &mut dyn SeedSource) -> FlowResult<DerivedTables> {
        self.allocation.validate(graph, self.total_endpoints())?;
        let tables = derive::derive(
            graph,
            &self.allocation,
            self.total_endpoints(),
            self.clock_period,
            seeds,
        )?;
        tracing::info!(
            endpoints = tables.len(),
            clamped = tables.adjusted().count(),
            "derived endpoint and injector records"
        );
        Ok(tables)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn reference_clock_mhz(&self) -> u32 {
        self.reference_clock_mhz
    }

    /// Injector clock period (ns x 100).
    pub fn clock_period(&self) -> u32 {
        self.clock_period
    }

    /// Total number of addressable endpoints.
    pub fn total_endpoints(&self) -> usize {
        self.layout.len()
    }

    /// Standalone endpoints left in the base mesh.
    pub fn base_endpoints(&self) -> usize {
        self.width * self.height - self.wrappers
    }

    pub fn wrapper_count(&self) -> usize {
        self.wrappers
    }

    pub fn bus_count(&self) -> usize {
        self.buses
    }

    pub fn crossbar_count(&self) -> usize {
        self.crossbars
    }

    /// Endpoint count of each bus, in embedding order.
    pub fn bus_sizes(&self) -> &[usize] {
        &self.bus_sizes
    }

    /// Endpoint count of each crossbar, in embedding order.
    pub fn crossbar_sizes(&self) -> &[usize] {
        &self.crossbar_sizes
    }

    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// Contents of the cell at `cell`.
    pub fn cell(&self, cell: impl Into<MeshCell>) -> Option<Cell> {
        let cell = cell.into();
        if cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        Some(self.cells[cell.index(self.width)])
    }

    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn allocation(&self) -> &AllocationMap {
        &self.allocation
    }

    /// Base-mesh cell index of every address.
    pub fn wrapper_addresses(&self) -> Vec<CellIndex> {
        self.layout.wrapper_addresses()
    }

    /// Addresses of a structure's slots.
    pub fn structure_addresses(&self, id: StructureId) -> Option<&[Address]> {
        self.layout.structure_addresses(id)
    }
}
