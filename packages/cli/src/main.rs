#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for crash severity scoring.
//!
//! Uses `indicatif-log-bridge` (via [`crash_score_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use crash_score_cli_utils::init_logger;
use crash_score_config::{ConfigError, ConfigOverrides, RunConfig};
use crash_score_network_models::FeatureKind;

#[derive(Parser)]
#[command(
    name = "crash_score",
    about = "EPDO crash severity scoring for intersections and road segments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every intersection and segment and write the high-crash tables
    Run {
        #[command(flatten)]
        args: ConfigArgs,
        /// Also write a `GeoJSON` file of the high-crash polygons
        #[arg(long)]
        geojson: bool,
    },
    /// Parse and validate a configuration file without reading any data
    Validate {
        #[command(flatten)]
        args: ConfigArgs,
    },
    /// Report how many features each threshold would select. Writes nothing.
    Sweep {
        #[command(flatten)]
        args: ConfigArgs,
        /// Feature set to sweep ("intersection" or "segment")
        #[arg(long, value_parser = parse_kind)]
        kind: FeatureKind,
        /// Comma-separated list of thresholds to try (e.g., "1,3,5,10")
        #[arg(long, value_delimiter = ',', required = true)]
        thresholds: Vec<u64>,
    },
}

/// Config file location plus command line overrides for its values.
#[derive(Args)]
struct ConfigArgs {
    /// Path to the TOML run configuration
    #[arg(long)]
    config: PathBuf,
    /// Weight for fatal crashes
    #[arg(long)]
    fatal_weight: Option<f64>,
    /// Weight for incapacitating (serious) injury crashes
    #[arg(long)]
    serious_weight: Option<f64>,
    /// Weight for non-incapacitating injury crashes
    #[arg(long)]
    non_serious_weight: Option<f64>,
    /// Weight for possible injury crashes
    #[arg(long)]
    possible_weight: Option<f64>,
    /// Minimum crash count for a high-crash intersection
    #[arg(long, allow_negative_numbers = true)]
    intersection_threshold: Option<i64>,
    /// Minimum crash count for a high-crash segment
    #[arg(long, allow_negative_numbers = true)]
    segment_threshold: Option<i64>,
    /// Crash records file
    #[arg(long)]
    crashes: Option<PathBuf>,
    /// Intersection polygons (`GeoJSON`)
    #[arg(long)]
    intersections: Option<PathBuf>,
    /// Segment polygons (`GeoJSON`)
    #[arg(long)]
    segments: Option<PathBuf>,
    /// Directory result files are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(self, geojson: bool) -> Result<RunConfig, ConfigError> {
        let overrides = ConfigOverrides {
            fatal_weight: self.fatal_weight,
            serious_weight: self.serious_weight,
            non_serious_weight: self.non_serious_weight,
            possible_weight: self.possible_weight,
            intersection_threshold: self.intersection_threshold,
            segment_threshold: self.segment_threshold,
            crashes: self.crashes,
            intersections: self.intersections,
            segments: self.segments,
            output_dir: self.output_dir,
            geojson,
        };
        RunConfig::load(&self.config, &overrides)
    }
}

fn parse_kind(value: &str) -> Result<FeatureKind, String> {
    value
        .parse()
        .map_err(|_| format!("unknown feature kind '{value}' (expected intersection or segment)"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { args, geojson } => {
            let start = Instant::now();
            let config = args.load(geojson)?;
            let summary = pipeline::run(&config, &multi)?;

            println!(
                "Crashes: {} loaded, {} skipped without location",
                summary.crashes.loaded, summary.crashes.skipped_geometry
            );
            println!(
                "{:<14} {:>9} {:>7} {:>9} {:>9}",
                "KIND", "THRESHOLD", "SCORED", "SELECTED", "SKIPPED"
            );
            println!("{}", "-".repeat(52));
            for kind in &summary.kinds {
                println!(
                    "{:<14} {:>9} {:>7} {:>9} {:>9}",
                    kind.kind.label(),
                    kind.threshold,
                    kind.scored,
                    kind.selected,
                    kind.skipped
                );
            }
            for path in &summary.written {
                println!("Wrote {}", path.display());
            }

            log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::Validate { args } => {
            let path = args.config.clone();
            let config = args.load(false)?;
            let weights = &config.weights;

            println!("{} is valid", path.display());
            println!(
                "  weights: fatal={} serious={} non_serious={} possible={} pdo=1",
                weights.fatal(),
                weights.serious(),
                weights.non_serious(),
                weights.possible()
            );
            for &kind in FeatureKind::all() {
                println!(
                    "  {}: threshold {} from {}",
                    kind.label(),
                    config.thresholds.for_kind(kind),
                    config.inputs.features(kind).display()
                );
            }
            println!("  crashes: {}", config.inputs.crashes.display());
            println!("  output: {}", config.output.dir.display());
        }
        Commands::Sweep {
            args,
            kind,
            thresholds,
        } => {
            let config = args.load(false)?;
            let counts = pipeline::sweep(&config, kind, &thresholds, &multi)?;

            println!("{:<12} SELECTED", "THRESHOLD");
            println!("{}", "-".repeat(24));
            for (threshold, selected) in counts {
                println!("{threshold:<12} {selected}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn sweep_parses_threshold_list() {
        let cli = Cli::try_parse_from([
            "crash_score",
            "sweep",
            "--config",
            "run.toml",
            "--kind",
            "segment",
            "--thresholds",
            "1,3,5",
        ])
        .unwrap();
        let Commands::Sweep {
            kind, thresholds, ..
        } = cli.command
        else {
            panic!("expected sweep");
        };
        assert_eq!(kind, FeatureKind::Segment);
        assert_eq!(thresholds, vec![1, 3, 5]);
    }

    #[test]
    fn unknown_kind_rejected() {
        let result = Cli::try_parse_from([
            "crash_score",
            "sweep",
            "--config",
            "run.toml",
            "--kind",
            "corridor",
            "--thresholds",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn negative_threshold_override_reaches_config() {
        let cli = Cli::try_parse_from([
            "crash_score",
            "run",
            "--config",
            "run.toml",
            "--segment-threshold",
            "-2",
        ])
        .unwrap();
        let Commands::Run { args, geojson } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.segment_threshold, Some(-2));
        assert!(!geojson);
    }
}
