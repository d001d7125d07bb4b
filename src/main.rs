//! swap-impact - garment swap impact calculator
//!
//! Command-line front end for the impact engine.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use swap_impact::{
    default_dataset, init_tracing, load_dataset, validate_dataset, EngineConfig, ImpactEngine,
    ImpactRequest, ReferenceStore,
};

/// swap-impact - estimate the environmental impact avoided by garment swaps
#[derive(Parser, Debug)]
#[command(name = "swap-impact")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to engine configuration file (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate one garment from a JSON request file
    Estimate {
        /// Request file (`-` for stdin)
        request: PathBuf,
    },

    /// Estimate both garments of a swap
    Swap {
        /// Request file for the first garment
        first: PathBuf,
        /// Request file for the second garment
        second: PathBuf,
    },

    /// Check a reference dataset for suspicious values
    CheckData {
        /// Dataset file (defaults to the configured or embedded dataset)
        dataset: Option<PathBuf>,
    },

    /// List known materials
    #[command(alias = "ls")]
    Materials,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default()?,
    };

    match cli.command {
        Commands::Estimate { request } => {
            let request = read_request(&request)?;
            let engine = ImpactEngine::new(config.open_store()?, config);
            let estimate = engine.estimate(&request)?;
            println!("{}", serde_json::to_string_pretty(&estimate)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Swap { first, second } => {
            let first = read_request(&first)?;
            let second = read_request(&second)?;
            let engine = ImpactEngine::new(config.open_store()?, config);
            let swap = engine.estimate_swap(&first, &second)?;
            println!("{}", serde_json::to_string_pretty(&swap)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckData { dataset } => {
            let path = dataset.or_else(|| config.reference_data.clone());
            let (label, dataset) = match &path {
                Some(path) => (path.display().to_string(), load_dataset(path)?),
                None => ("embedded dataset".to_string(), default_dataset()),
            };

            let warnings = validate_dataset(&dataset);
            if warnings.is_empty() {
                println!("{}: no problems found", label);
                return Ok(ExitCode::SUCCESS);
            }
            println!("{}: {} problem(s)", label, warnings.len());
            for w in &warnings {
                if w.value.is_empty() {
                    println!("  {}: {}", w.field, w.message);
                } else {
                    println!("  {}: {} [{}]", w.field, w.message, w.value);
                }
            }
            Ok(ExitCode::FAILURE)
        }
        Commands::Materials => {
            let snapshot = config.open_store()?.snapshot()?;
            println!(
                "{:<24} {:<12} {:>10} {:>8}",
                "MATERIAL", "CATEGORY", "CO2/KG", "QUALITY"
            );
            for m in snapshot.materials() {
                println!(
                    "{:<24} {:<12} {:>10.2} {:>8}",
                    m.name,
                    m.category,
                    m.co2_per_kg,
                    m.data_quality.as_str()
                );
            }
            if let Some(default) = snapshot.get_global_default_material() {
                println!("\nFallback for unknown materials: {}", default.name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_request(path: &Path) -> Result<ImpactRequest> {
    let content = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read request from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {:?}", path))?
    };
    serde_json::from_str(&content).with_context(|| format!("Invalid request JSON in {:?}", path))
}
