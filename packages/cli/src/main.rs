#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for computing the pedestrian environment index.
//!
//! Uses `indicatif-log-bridge` (via [`walkability_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the step bar never fight for the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use walkability_analytics_models::IndexVariant;
use walkability_cli_utils::IndicatifProgress;
use walkability_pipeline::config::{OutputConfig, OutputFormat, RunConfig};
use walkability_pipeline::output::write_output;
use walkability_pipeline::run::run;
use walkability_pipeline::tables::InputTables;

#[derive(Parser)]
#[command(name = "walkability", about = "Pedestrian environment index calculator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every unit and write the output table
    Run {
        /// Path to the TOML run file
        config: PathBuf,
        /// Output path (overrides `[output].path` in the run file)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Output format: `csv` or `json` (overrides `[output].format`)
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Load and validate every configured input without scoring
    Check {
        /// Path to the TOML run file
        config: PathBuf,
    },
    /// List the named index variants and their sub-metrics
    Variants,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = walkability_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            output,
            format,
        } => {
            let start = Instant::now();
            let config = RunConfig::load(&config)?;
            let target = output_target(config.output.as_ref(), output, format);

            let progress = IndicatifProgress::steps_bar(&multi, "Scoring");
            let result = run(&config, &progress)?;

            for fallback in result.report.fallbacks() {
                log::warn!(
                    "{} scored 0 for every unit: {}",
                    fallback.metric,
                    fallback.fallback.as_deref().unwrap_or_default()
                );
            }

            match target {
                Some(target) => write_output(&result, &target)?,
                None => log::warn!("No [output] configured and no --output given; nothing written"),
            }

            log::info!(
                "Scored {} unit(s) in {:.1}s",
                result.rows.len(),
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Check { config } => {
            let config = RunConfig::load(&config)?;
            let plan = config.plan()?;
            let tables = InputTables::load(&config.inputs, &plan)?;

            println!("Variant: {}", config.variant);
            for metric in &plan {
                match metric.overlay_rule {
                    Some(rule) => println!("  {:<24} {} ({rule})", metric.name, metric.policy),
                    None => println!("  {:<24} {}", metric.name, metric.policy),
                }
            }
            println!();
            for line in tables.summary() {
                println!("{line}");
            }
        }
        Commands::Variants => {
            for variant in IndexVariant::ALL {
                let metrics: Vec<String> =
                    variant.metrics().iter().map(ToString::to_string).collect();
                println!("{:<12} {}", variant.to_string(), variant.description());
                println!("{:<12} {}", "", metrics.join(", "));
            }
        }
    }

    Ok(())
}

/// Merges command-line output overrides into the run file's `[output]`.
fn output_target(
    configured: Option<&OutputConfig>,
    path: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Option<OutputConfig> {
    let path = path.or_else(|| configured.map(|o| o.path.clone()))?;
    let format = format
        .or_else(|| configured.map(|o| o.format))
        .unwrap_or_default();
    Some(OutputConfig { path, format })
}
