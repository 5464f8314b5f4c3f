//! Run summary report.
//!
//! A [`RunSummary`] condenses a composed platform and its communication
//! graph into the figures needed to compare setups: endpoint counts per
//! structure kind, graph size and per-thread bandwidth statistics.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::emit::write_file;
use crate::error::FlowResult;
use crate::graph::CommGraph;
use crate::platform::Platform;
use crate::types::Mbps;

/// Endpoint counts of the composed platform.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupStats {
    /// All addressable endpoints
    pub total_pes: usize,

    /// Standalone endpoints left in the base mesh
    pub base_pes: usize,

    pub wrappers: usize,
    pub buses: usize,

    /// Endpoints of each bus, in embedding order
    pub pes_per_bus: Vec<usize>,

    pub crossbars: usize,

    /// Endpoints of each crossbar, in embedding order
    pub pes_per_crossbar: Vec<usize>,
}

/// Size of the communication graph and its bandwidth demand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub applications: usize,
    pub threads: usize,
    pub targets: usize,

    /// Sum of every thread's outgoing bandwidth
    pub total_bandwidth: Mbps,

    /// Mean outgoing bandwidth per thread
    pub mean_bandwidth: Mbps,

    /// Population standard deviation of per-thread bandwidth
    pub bandwidth_std_dev: Mbps,
}

/// Summary of one generated setup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub setup: SetupStats,
    pub application: ApplicationStats,
}

impl RunSummary {
    /// Collects the summary of `platform` running `graph`.
    pub fn new(name: impl Into<String>, platform: &Platform, graph: &CommGraph) -> Self {
        let setup = SetupStats {
            total_pes: platform.total_endpoints(),
            base_pes: platform.base_endpoints(),
            wrappers: platform.wrapper_count(),
            buses: platform.bus_count(),
            pes_per_bus: platform.bus_sizes().to_vec(),
            crossbars: platform.crossbar_count(),
            pes_per_crossbar: platform.crossbar_sizes().to_vec(),
        };

        let bandwidths: Vec<Mbps> = graph.threads().map(|t| t.total_bandwidth()).collect();
        let (mean, std_dev) = mean_and_pstdev(&bandwidths);
        let application = ApplicationStats {
            applications: graph.application_count(),
            threads: graph.thread_count(),
            targets: graph.target_count(),
            total_bandwidth: bandwidths.iter().sum(),
            mean_bandwidth: mean,
            bandwidth_std_dev: std_dev,
        };

        Self {
            name: name.into(),
            setup,
            application,
        }
    }

    /// File name of the text report.
    pub fn file_name(&self) -> String {
        format!("{}Info.txt", self.name)
    }

    /// Exports the summary to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Exports the summary as `metric,value` rows.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();
        csv.push_str("metric,value\n");

        csv.push_str(&format!("total_pes,{}\n", self.setup.total_pes));
        csv.push_str(&format!("base_pes,{}\n", self.setup.base_pes));
        csv.push_str(&format!("wrappers,{}\n", self.setup.wrappers));
        csv.push_str(&format!("buses,{}\n", self.setup.buses));
        csv.push_str(&format!("crossbars,{}\n", self.setup.crossbars));

        csv.push_str(&format!("applications,{}\n", self.application.applications));
        csv.push_str(&format!("threads,{}\n", self.application.threads));
        csv.push_str(&format!("targets,{}\n", self.application.targets));
        csv.push_str(&format!("total_bandwidth,{:.2}\n", self.application.total_bandwidth));
        csv.push_str(&format!("mean_bandwidth,{:.2}\n", self.application.mean_bandwidth));
        csv.push_str(&format!("bandwidth_std_dev,{:.2}\n", self.application.bandwidth_std_dev));

        csv
    }

    /// Writes the human-readable report to a writer.
    pub fn write_summary<W: Write>(&self, mut w: W) -> std::io::Result<()> {
        let s = &self.setup;
        writeln!(w, "Setup: {}", self.name)?;
        writeln!(w, "\tAmount of PEs: {}", s.total_pes)?;
        writeln!(w, "\tAmount of PEs in base NoC: {}", s.base_pes)?;
        writeln!(w, "\tAmount of Wrappers: {}", s.wrappers)?;
        writeln!(w, "\tAmount of Buses: {}", s.buses)?;
        writeln!(w, "\tAmount of PEs in each Bus: {:?}", s.pes_per_bus)?;
        writeln!(w, "\tAmount of Crossbars: {}", s.crossbars)?;
        writeln!(w, "\tAmount of PEs in each Crossbar: {:?}", s.pes_per_crossbar)?;

        let a = &self.application;
        writeln!(w, "Application:")?;
        writeln!(w, "\tNumber of Applications: {}", a.applications)?;
        writeln!(w, "\tNumber of Threads: {}", a.threads)?;
        writeln!(w, "\tAmount of Targets: {}", a.targets)?;
        writeln!(w, "\tTotal required bandwidth: {}", a.total_bandwidth)?;
        writeln!(w, "\tAverage required bandwidth (per thread): {}", a.mean_bandwidth)?;
        writeln!(w, "\tStd deviation of required bandwidth (per thread): {}", a.bandwidth_std_dev)?;

        Ok(())
    }

    /// Returns the report as a string.
    pub fn summary(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_summary(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Writes `<name>Info.txt` into `dir` and returns its path.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> FlowResult<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        write_file(&path, &self.summary())?;
        tracing::info!("Summary written to {}", path.display());
        Ok(path)
    }
}

/// Mean and population standard deviation; both zero for no samples.
fn mean_and_pstdev(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
