//! Application factory registry.
//!
//! The registry maps names to functions that add an application to a
//! [`CommGraph`], so configuration files can refer to well-known benchmark
//! task graphs by name instead of spelling out every thread.
//!
//! # Example
//!
//! ```
//! use nocflow::graph::CommGraph;
//! use nocflow::registry::create_default_registry;
//!
//! let registry = create_default_registry();
//! let mut graph = CommGraph::new();
//! let app = registry.create("PIP", &mut graph).unwrap().unwrap();
//!
//! assert_eq!(graph.application(app).unwrap().threads().len(), 8);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FlowResult;
use crate::graph::CommGraph;
use crate::types::{AppId, Mbps};

/// Type alias for application factory functions.
pub type AppFactory = Arc<dyn Fn(&mut CommGraph) -> FlowResult<AppId> + Send + Sync>;

/// A registry for application factories.
#[derive(Default)]
pub struct AppRegistry {
    factories: HashMap<String, AppFactory>,
}

impl AppRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an application factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&mut CommGraph) -> FlowResult<AppId> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Adds the application registered as `name` to `graph`.
    ///
    /// # Returns
    /// `None` if no such application is registered, otherwise the result of
    /// the factory.
    pub fn create(&self, name: &str, graph: &mut CommGraph) -> Option<FlowResult<AppId>> {
        self.factories.get(name).map(|f| f(graph))
    }

    /// Returns true if a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppRegistry")
            .field("registered_apps", &self.names())
            .finish()
    }
}

/// Static description of a task graph: thread names in insertion order and
/// `(source, destination, Mbps)` edges.
struct TaskGraph {
    name: &'static str,
    threads: &'static [&'static str],
    edges: &'static [(&'static str, &'static str, Mbps)],
}

impl TaskGraph {
    fn build(&self, graph: &mut CommGraph) -> FlowResult<AppId> {
        let app = graph.add_application(self.name);
        let mut refs = HashMap::with_capacity(self.threads.len());
        for name in self.threads {
            refs.insert(*name, graph.add_thread(app, Some(*name))?);
        }
        for (src, dst, bandwidth) in self.edges {
            // Names are static and listed above.
            graph.add_target(refs[src], refs[dst], *bandwidth)?;
        }
        Ok(app)
    }
}

/// Multi-window display.
const MWD: TaskGraph = TaskGraph {
    name: "MWD",
    threads: &[
        "IN", "NR", "MEM1", "VS", "HS", "MEM2", "HVS", "JUG1", "MEM3", "JUG2", "SE", "Blend",
    ],
    edges: &[
        ("IN", "NR", 64.0),
        ("IN", "HS", 128.0),
        ("NR", "MEM1", 64.0),
        ("NR", "MEM2", 96.0),
        ("MEM1", "NR", 64.0),
        ("HS", "VS", 96.0),
        ("VS", "JUG1", 96.0),
        ("MEM2", "HVS", 96.0),
        ("HVS", "JUG2", 96.0),
        ("JUG1", "MEM3", 96.0),
        ("MEM3", "SE", 64.0),
        ("JUG2", "MEM3", 96.0),
        ("SE", "Blend", 16.0),
    ],
};

/// Video object plane decoder.
const VOPD: TaskGraph = TaskGraph {
    name: "VOPD",
    threads: &[
        "VLD", "RunLeDec", "InvScan", "AcdcPred", "Iquan", "IDCT", "ARM", "UpSamp", "VopRec",
        "Pad", "VopMem", "StripeMem",
    ],
    edges: &[
        ("VLD", "RunLeDec", 70.0),
        ("RunLeDec", "InvScan", 362.0),
        ("InvScan", "AcdcPred", 362.0),
        ("AcdcPred", "Iquan", 362.0),
        ("AcdcPred", "StripeMem", 49.0),
        ("StripeMem", "Iquan", 27.0),
        ("Iquan", "IDCT", 357.0),
        ("IDCT", "UpSamp", 353.0),
        ("ARM", "IDCT", 16.0),
        ("ARM", "Pad", 16.0),
        ("UpSamp", "VopRec", 300.0),
        ("VopRec", "Pad", 313.0),
        ("Pad", "VopMem", 313.0),
        ("VopMem", "Pad", 94.0),
    ],
};

/// MPEG-4 decoder.
const MPEG4: TaskGraph = TaskGraph {
    name: "MPEG4",
    threads: &[
        "VU", "AU", "MedCPU", "RAST", "SDRAM", "SRAM1", "SRAM2", "IDCT", "ADSP", "UpSamp", "BAB",
        "RISC",
    ],
    edges: &[
        ("VU", "SDRAM", 190.0),
        ("AU", "SDRAM", 0.5),
        ("MedCPU", "SDRAM", 60.0),
        ("MedCPU", "SRAM1", 40.0),
        ("RAST", "SDRAM", 600.0),
        ("RAST", "SRAM1", 40.0),
        ("SDRAM", "VU", 190.0),
        ("SDRAM", "AU", 0.5),
        ("SDRAM", "MedCPU", 60.0),
        ("SDRAM", "RAST", 600.0),
        ("SDRAM", "ADSP", 0.5),
        ("SDRAM", "UpSamp", 910.0),
        ("SDRAM", "BAB", 32.0),
        ("SRAM1", "MedCPU", 40.0),
        ("SRAM1", "RAST", 40.0),
        ("SRAM2", "IDCT", 250.0),
        ("SRAM2", "UpSamp", 670.0),
        ("SRAM2", "BAB", 173.0),
        ("SRAM2", "RISC", 500.0),
        ("IDCT", "SRAM2", 250.0),
        ("ADSP", "SDRAM", 0.5),
        ("UpSamp", "SDRAM", 910.0),
        ("UpSamp", "SRAM2", 670.0),
        ("BAB", "SDRAM", 32.0),
        ("BAB", "SRAM2", 173.0),
        ("RISC", "SRAM2", 500.0),
    ],
};

/// Picture-in-picture.
const PIP: TaskGraph = TaskGraph {
    name: "PIP",
    threads: &["InpMemA", "HS", "VS", "JUG1", "InpMemB", "JUG2", "MEM", "OpDisp"],
    edges: &[
        ("InpMemA", "HS", 128.0),
        ("InpMemA", "InpMemB", 64.0),
        ("HS", "VS", 64.0),
        ("VS", "JUG1", 64.0),
        ("JUG1", "MEM", 64.0),
        ("InpMemB", "JUG2", 64.0),
        ("JUG2", "MEM", 64.0),
        ("MEM", "OpDisp", 64.0),
    ],
};

/// Creates a registry with the built-in benchmark applications.
///
/// Includes:
/// - `MWD` - multi-window display (12 threads)
/// - `VOPD` - video object plane decoder (12 threads)
/// - `MPEG4` - MPEG-4 decoder (12 threads)
/// - `PIP` - picture-in-picture (8 threads)
pub fn create_default_registry() -> AppRegistry {
    let mut registry = AppRegistry::new();
    for task_graph in [MWD, VOPD, MPEG4, PIP] {
        let name = task_graph.name;
        registry.register(name, move |graph| task_graph.build(graph));
    }
    registry
}
