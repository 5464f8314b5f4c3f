//! Configuration system for flow generation.
//!
//! This module provides YAML/JSON configuration file support for describing
//! a platform, the applications mapped onto it and their allocation.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! platform:
//!   width: 3
//!   height: 3
//!   reference_clock_mhz: 25
//!   structures:
//!     - kind: Crossbar
//!       endpoints: 7
//!       cell: [2, 0]
//!     - kind: Bus
//!       endpoints: 6
//!       cell: [2, 1]
//!
//! applications:
//!   - preset: PIP
//!   - name: Pair
//!     threads:
//!       - name: producer
//!         targets:
//!           - thread: consumer
//!             bandwidth: 32
//!       - name: consumer
//!
//! allocation:
//!   strategy: sequential
//!
//! output:
//!   name: H16_25_PIP
//!   directory: flows/H16_25_PIP
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::allocation::AllocationMap;
use crate::derive::injector_clock_period;
use crate::error::FlowError;
use crate::graph::{CommGraph, ThreadRef};
use crate::platform::Platform;
use crate::registry::AppRegistry;
use crate::structure::{Structure, StructureKind};
use crate::types::{Address, Mbps, MeshCell};

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),

    #[error("Unknown application preset: {0}")]
    UnknownPreset(String),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Base mesh and embedded structures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformParams {
    /// Base mesh width (columns)
    pub width: usize,

    /// Base mesh height (rows)
    pub height: usize,

    /// Reference clock in MHz
    #[serde(default = "default_reference_clock")]
    pub reference_clock_mhz: u32,

    /// Structures, embedded in list order
    #[serde(default)]
    pub structures: Vec<StructureConfig>,
}

fn default_reference_clock() -> u32 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_run_name() -> String {
    "flow".to_string()
}

impl Default for PlatformParams {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            reference_clock_mhz: default_reference_clock(),
            structures: Vec::new(),
        }
    }
}

/// A bus or crossbar to embed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StructureConfig {
    pub kind: StructureKind,

    /// Number of endpoints
    pub endpoints: usize,

    /// Wrapper cell as `[x, y]`
    pub cell: MeshCell,
}

/// One outgoing edge of a thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Destination thread name
    pub thread: String,

    /// Bandwidth in Mbps
    pub bandwidth: Mbps,

    /// Destination application (defaults to the source's application)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

/// A thread and its outgoing edges.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadConfig {
    pub name: String,

    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// An application: either a registered preset or an explicit task graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApplicationConfig {
    Preset { preset: String },
    Custom { name: String, threads: Vec<ThreadConfig> },
}

impl ApplicationConfig {
    /// Name under which the application is registered in the graph.
    pub fn name(&self) -> &str {
        match self {
            ApplicationConfig::Preset { preset } => preset,
            ApplicationConfig::Custom { name, .. } => name,
        }
    }
}

/// How threads are bound to addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// Use the explicit `bindings` list
    #[default]
    Explicit,
    /// Bind every thread, in graph order, to addresses `0..`
    Sequential,
}

/// A single explicit binding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindingConfig {
    pub app: String,
    pub thread: String,
    pub address: Address,
}

/// Allocation map configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AllocationConfig {
    #[serde(default)]
    pub strategy: AllocationStrategy,

    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

/// Output parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputParams {
    /// Run name, used for the summary report file
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Output directory for generated files
    #[serde(default)]
    pub directory: Option<String>,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            directory: None,
            log_level: default_log_level(),
        }
    }
}

/// Complete generation configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub platform: PlatformParams,

    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,

    #[serde(default)]
    pub allocation: AllocationConfig,

    #[serde(default)]
    pub output: OutputParams,
}

/// A composed platform together with the graph bound to it.
#[derive(Debug)]
pub struct Composition {
    pub graph: CommGraph,
    pub platform: Platform,
}

impl GenerationConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: GenerationConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: GenerationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration without building anything.
    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.platform;
        if p.width == 0 || p.height == 0 {
            return Err(ConfigError::Validation(format!(
                "Base mesh must be at least 1x1, got {}x{}",
                p.width, p.height
            )));
        }
        if injector_clock_period(p.reference_clock_mhz).is_err() {
            return Err(ConfigError::Validation(format!(
                "Reference clock of {} MHz yields a zero injector clock period",
                p.reference_clock_mhz
            )));
        }

        // Validate structures fit and do not share cells
        let mut cells = HashSet::new();
        for s in &p.structures {
            if s.endpoints == 0 {
                return Err(ConfigError::Validation(format!(
                    "{} at {} has no endpoints",
                    s.kind, s.cell
                )));
            }
            if s.cell.x >= p.width || s.cell.y >= p.height {
                return Err(ConfigError::Validation(format!(
                    "{} cell {} is outside the {}x{} mesh",
                    s.kind, s.cell, p.width, p.height
                )));
            }
            if !cells.insert(s.cell) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate wrapper cell: {}",
                    s.cell
                )));
            }
        }

        // Validate application and thread names
        let mut app_names = HashSet::new();
        for app in &self.applications {
            if !app_names.insert(app.name()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate application: {}",
                    app.name()
                )));
            }
            if let ApplicationConfig::Custom { name, threads } = app {
                let mut thread_names = HashSet::new();
                for t in threads {
                    if !thread_names.insert(t.name.as_str()) {
                        return Err(ConfigError::Validation(format!(
                            "Duplicate thread {} in application {}",
                            t.name, name
                        )));
                    }
                }
            }
        }

        // Validate targets reference declared applications
        for app in &self.applications {
            if let ApplicationConfig::Custom { threads, .. } = app {
                for target in threads.iter().flat_map(|t| &t.targets) {
                    if let Some(dst_app) = &target.app {
                        if !app_names.contains(dst_app.as_str()) {
                            return Err(ConfigError::Validation(format!(
                                "Target references non-existent application: {}",
                                dst_app
                            )));
                        }
                    }
                }
            }
        }

        // Validate bindings use distinct addresses
        let mut addresses = HashSet::new();
        for b in &self.allocation.bindings {
            if !addresses.insert(b.address) {
                return Err(ConfigError::Validation(format!(
                    "Address {} is bound more than once",
                    b.address
                )));
            }
            if !app_names.contains(b.app.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Binding references non-existent application: {}",
                    b.app
                )));
            }
        }

        Ok(())
    }

    /// Builds the platform, the communication graph and the allocation.
    ///
    /// Structures are embedded in list order. Applications are registered
    /// in list order before any edge is added, so edges may point to
    /// threads of applications declared later.
    pub fn build(&self, registry: &AppRegistry) -> ConfigResult<Composition> {
        self.validate()?;
        let p = &self.platform;

        let mut platform = Platform::new(p.width, p.height, p.reference_clock_mhz)?;
        for s in &p.structures {
            platform.embed(Structure::new(s.kind, s.endpoints)?, s.cell)?;
        }

        let mut graph = CommGraph::new();
        for app in &self.applications {
            match app {
                ApplicationConfig::Preset { preset } => {
                    registry
                        .create(preset, &mut graph)
                        .ok_or_else(|| ConfigError::UnknownPreset(preset.clone()))??;
                }
                ApplicationConfig::Custom { name, threads } => {
                    let id = graph.add_application(name.clone());
                    for t in threads {
                        graph.add_thread(id, Some(t.name.as_str()))?;
                    }
                }
            }
        }

        for app in &self.applications {
            let ApplicationConfig::Custom { name, threads } = app else {
                continue;
            };
            for t in threads {
                let src = resolve(&graph, name, &t.name)?;
                for target in &t.targets {
                    let dst_app = target.app.as_deref().unwrap_or(name);
                    let dst = resolve(&graph, dst_app, &target.thread)?;
                    graph.add_target(src, dst, target.bandwidth)?;
                }
            }
        }

        let allocation = match self.allocation.strategy {
            AllocationStrategy::Sequential => AllocationMap::sequential(&graph),
            AllocationStrategy::Explicit => self
                .allocation
                .bindings
                .iter()
                .map(|b| resolve(&graph, &b.app, &b.thread).map(|t| (b.address, t)))
                .collect::<ConfigResult<AllocationMap>>()?,
        };
        platform.install_allocation(&graph, allocation)?;

        Ok(Composition { graph, platform })
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Logging level for a run: `cli` when given, otherwise `output.log_level`.
    pub fn log_level<'a>(&'a self, cli: Option<&'a str>) -> &'a str {
        cli.unwrap_or(&self.output.log_level)
    }

    /// Returns the number of structures.
    pub fn structure_count(&self) -> usize {
        self.platform.structures.len()
    }

    /// Returns the number of applications.
    pub fn application_count(&self) -> usize {
        self.applications.len()
    }
}

fn resolve(graph: &CommGraph, app: &str, thread: &str) -> ConfigResult<ThreadRef> {
    graph.find_thread(app, thread).ok_or_else(|| {
        ConfigError::Validation(format!("Unknown thread {} in application {}", thread, app))
    })
}

/// Builder for creating GenerationConfig programmatically.
#[derive(Default)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base mesh dimensions.
    pub fn mesh(mut self, width: usize, height: usize) -> Self {
        self.config.platform.width = width;
        self.config.platform.height = height;
        self
    }

    /// Sets the reference clock.
    pub fn reference_clock(mut self, mhz: u32) -> Self {
        self.config.platform.reference_clock_mhz = mhz;
        self
    }

    /// Adds a bus.
    pub fn add_bus(self, endpoints: usize, cell: (usize, usize)) -> Self {
        self.add_structure(StructureKind::Bus, endpoints, cell)
    }

    /// Adds a crossbar.
    pub fn add_crossbar(self, endpoints: usize, cell: (usize, usize)) -> Self {
        self.add_structure(StructureKind::Crossbar, endpoints, cell)
    }

    fn add_structure(mut self, kind: StructureKind, endpoints: usize, cell: (usize, usize)) -> Self {
        self.config.platform.structures.push(StructureConfig {
            kind,
            endpoints,
            cell: cell.into(),
        });
        self
    }

    /// Adds a registered application by name.
    pub fn add_preset(mut self, name: impl Into<String>) -> Self {
        self.config
            .applications
            .push(ApplicationConfig::Preset { preset: name.into() });
        self
    }

    /// Adds an explicit application.
    pub fn add_application(mut self, name: impl Into<String>, threads: Vec<ThreadConfig>) -> Self {
        self.config.applications.push(ApplicationConfig::Custom {
            name: name.into(),
            threads,
        });
        self
    }

    /// Binds threads to addresses in graph order.
    pub fn sequential_allocation(mut self) -> Self {
        self.config.allocation.strategy = AllocationStrategy::Sequential;
        self
    }

    /// Adds an explicit binding.
    pub fn bind(mut self, app: impl Into<String>, thread: impl Into<String>, address: Address) -> Self {
        self.config.allocation.strategy = AllocationStrategy::Explicit;
        self.config.allocation.bindings.push(BindingConfig {
            app: app.into(),
            thread: thread.into(),
            address,
        });
        self
    }

    /// Sets the output directory.
    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.output.directory = Some(dir.into());
        self
    }

    /// Sets the run name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.output.name = name.into();
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<GenerationConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::create_default_registry;

    #[test]
    fn test_default_config() {
        let config = GenerationConfig::new();
        assert_eq!(config.platform.reference_clock_mhz, 100);
        assert_eq!(config.output.log_level, "info");
        assert_eq!(config.allocation.strategy, AllocationStrategy::Explicit);
        assert!(config.applications.is_empty());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
platform:
  width: 3
  height: 3
  reference_clock_mhz: 25
  structures:
    - kind: Crossbar
      endpoints: 7
      cell: [2, 0]
    - kind: Bus
      endpoints: 6
      cell: [2, 1]

applications:
  - preset: PIP
  - name: Pair
    threads:
      - name: producer
        targets:
          - thread: consumer
            bandwidth: 32
      - name: consumer

allocation:
  strategy: sequential
"#;

        let config = GenerationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.structure_count(), 2);
        assert_eq!(config.application_count(), 2);
        assert_eq!(config.allocation.strategy, AllocationStrategy::Sequential);
        assert!(matches!(config.applications[0], ApplicationConfig::Preset { .. }));

        let composition = config.build(&create_default_registry()).unwrap();
        assert_eq!(composition.platform.total_endpoints(), 9 + 6 + 5);
        assert_eq!(composition.graph.thread_count(), 10);
        assert_eq!(composition.platform.allocation().len(), 10);
    }

    #[test]
    fn test_log_level_fallback() {
        let yaml = r#"
platform:
  width: 2
  height: 2
output:
  log_level: trace
"#;
        let config = GenerationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.log_level(None), "trace");
        assert_eq!(config.log_level(Some("warn")), "warn");
        assert_eq!(GenerationConfig::new().log_level(None), "info");
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{
            "platform": {"width": 2, "height": 2, "reference_clock_mhz": 50},
            "applications": [
                {"name": "A", "threads": [{"name": "t0"}, {"name": "t1"}]}
            ],
            "allocation": {
                "bindings": [
                    {"app": "A", "thread": "t1", "address": 3}
                ]
            }
        }"#;

        let config = GenerationConfig::from_json(json).unwrap();
        let composition = config.build(&AppRegistry::new()).unwrap();
        let t1 = composition.graph.find_thread("A", "t1").unwrap();
        assert_eq!(composition.platform.allocation().thread_at(3), Some(t1));
    }

    #[test]
    fn test_builder() {
        let config = GenerationConfigBuilder::new()
            .mesh(4, 4)
            .reference_clock(10)
            .add_bus(6, (0, 3))
            .add_crossbar(6, (3, 3))
            .add_preset("MWD")
            .sequential_allocation()
            .name("H16_36")
            .build()
            .unwrap();

        assert_eq!(config.structure_count(), 2);
        assert_eq!(config.output.name, "H16_36");

        let composition = config.build(&create_default_registry()).unwrap();
        assert_eq!(composition.platform.total_endpoints(), 26);
        assert_eq!(composition.platform.crossbar_sizes(), &[6]);
    }

    #[test]
    fn test_validation_duplicate_cell() {
        let result = GenerationConfigBuilder::new()
            .mesh(2, 2)
            .add_bus(3, (1, 0))
            .add_bus(4, (1, 0))
            .build();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_degenerate_clock() {
        let yaml = r#"
platform:
  width: 2
  height: 2
  reference_clock_mhz: 500
"#;
        assert!(GenerationConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validation_cell_outside_mesh() {
        let result = GenerationConfigBuilder::new().mesh(2, 2).add_bus(3, (2, 0)).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_duplicate_address() {
        let result = GenerationConfigBuilder::new()
            .mesh(2, 2)
            .add_preset("PIP")
            .bind("PIP", "HS", 0)
            .bind("PIP", "VS", 0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_preset() {
        let config = GenerationConfigBuilder::new()
            .mesh(2, 2)
            .add_preset("NOPE")
            .build()
            .unwrap();
        let result = config.build(&create_default_registry());
        assert!(matches!(result, Err(ConfigError::UnknownPreset(_))));
    }

    #[test]
    fn test_allocation_beyond_platform_is_fatal() {
        let config = GenerationConfigBuilder::new()
            .mesh(2, 2)
            .add_preset("PIP")
            .sequential_allocation()
            .build()
            .unwrap();
        let result = config.build(&create_default_registry());
        assert!(matches!(
            result,
            Err(ConfigError::Flow(FlowError::AddressOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_unknown_target_thread() {
        let config = GenerationConfigBuilder::new()
            .mesh(2, 2)
            .add_application(
                "A",
                vec![ThreadConfig {
                    name: "t0".into(),
                    targets: vec![TargetConfig {
                        thread: "ghost".into(),
                        bandwidth: 1.0,
                        app: None,
                    }],
                }],
            )
            .build()
            .unwrap();
        assert!(matches!(
            config.build(&AppRegistry::new()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = GenerationConfigBuilder::new()
            .mesh(3, 3)
            .add_crossbar(7, (2, 0))
            .add_preset("VOPD")
            .bind("VOPD", "VLD", 4)
            .build()
            .unwrap();

        let yaml = config.to_yaml().unwrap();
        let restored = GenerationConfig::from_yaml(&yaml).unwrap();

        assert_eq!(restored.structure_count(), 1);
        assert_eq!(restored.allocation.bindings.len(), 1);
        assert_eq!(restored.applications[0].name(), "VOPD");
    }
}
