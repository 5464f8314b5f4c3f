//! nocflow - traffic-flow generator command line interface
//!
//! Usage:
//!   nocflow generate <CONFIG> [OPTIONS]   Derive and write the flow files
//!   nocflow summary <CONFIG>              Print the setup summary
//!   nocflow latency <DIR> --pes N         Average latencies from traffic logs

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nocflow::config::GenerationConfig;
use nocflow::derive::{RandomSeeds, SeedSource};
use nocflow::emit::write_all;
use nocflow::latency::LatencyReport;
use nocflow::registry::create_default_registry;
use nocflow::report::RunSummary;

#[derive(Parser)]
#[command(name = "nocflow")]
#[command(about = "Traffic-flow generator for hybrid Network-on-Chip platforms")]
#[command(version)]
struct Cli {
    /// Logging level (trace, debug, info, warn, error); overrides the
    /// configuration's `output.log_level`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive endpoint and injector documents from a configuration file
    Generate {
        /// YAML or JSON configuration file
        config: PathBuf,

        /// Output directory (overrides the configuration)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Reference clock in MHz (overrides the configuration)
        #[arg(short, long)]
        clock: Option<u32>,

        /// Seed for the injector seed generator, for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the setup summary without writing any file
    Summary {
        /// YAML or JSON configuration file
        config: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute average latencies from InLog/OutLog files
    Latency {
        /// Directory holding the logs
        dir: PathBuf,

        /// Number of endpoints in the platform
        #[arg(long)]
        pes: usize,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    let result = match cli.command {
        Commands::Generate {
            config,
            out,
            clock,
            seed,
        } => generate(config, out, clock, seed, log_level),
        Commands::Summary { config, json } => summary(config, json, log_level),
        Commands::Latency { dir, pes } => latency(dir, pes, log_level),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate(
    path: PathBuf,
    out: Option<PathBuf>,
    clock: Option<u32>,
    seed: Option<u64>,
    log_level: Option<&str>,
) -> CliResult {
    let mut config = GenerationConfig::from_file(&path)?;
    nocflow::init_logging(config.log_level(log_level));
    if let Some(mhz) = clock {
        config.platform.reference_clock_mhz = mhz;
    }

    let composition = config.build(&create_default_registry())?;
    let mut seeds: Box<dyn SeedSource> = match seed {
        Some(seed) => Box::new(RandomSeeds::seeded(seed)),
        None => Box::new(RandomSeeds::from_entropy()),
    };
    let tables = composition.platform.derive(&composition.graph, seeds.as_mut())?;

    let dir = out
        .or_else(|| config.output.directory.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("flows").join(&config.output.name));
    let report = write_all(&dir, &composition.platform, &tables)?;

    RunSummary::new(&config.output.name, &composition.platform, &composition.graph)
        .write_to_dir(&dir)?;

    println!(
        "Wrote {} files to {}",
        report.files_written + 1,
        report.directory.display()
    );
    Ok(())
}

fn summary(path: PathBuf, json: bool, log_level: Option<&str>) -> CliResult {
    let config = GenerationConfig::from_file(&path)?;
    nocflow::init_logging(config.log_level(log_level));
    let composition = config.build(&create_default_registry())?;
    let summary = RunSummary::new(&config.output.name, &composition.platform, &composition.graph);

    if json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{}", summary.summary());
    }
    Ok(())
}

fn latency(dir: PathBuf, pes: usize, log_level: Option<&str>) -> CliResult {
    nocflow::init_logging(log_level.unwrap_or("info"));
    let report = LatencyReport::from_logs(&dir, pes)?;
    print!("{}", report.to_table());
    Ok(())
}
