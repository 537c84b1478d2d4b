//! isocycle-bench: CLI tool for contour graph experiments and diagnostics.
//!
//! Loads a scalar field from JSON, runs the contour graph pipeline with
//! configurable parameters, and prints per-stage diagnostics. Useful for:
//!
//! - Checking whether a field's zero isocontour closes
//! - Tuning the stitching radius for fields cut by the grid boundary
//! - Measuring per-stage durations on large grids
//!
//! The field file holds a JSON array of rows indexed by the first axis,
//! e.g. `[[1.0, 1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0]]`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin isocycle-bench -- [OPTIONS] <FIELD_PATH>
//! ```
//!
//! Set `RUST_LOG=isocycle_core=debug` for per-stage log lines.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use isocycle_core::diagnostics::{Clock, GraphDiagnostics};
use isocycle_core::{ContourGraph, CycleId, GraphConfig, ScalarGrid};
use tracing_subscriber::EnvFilter;

/// Contour graph experimentation and diagnostics for isocycle.
///
/// Runs the marching-squares pipeline on a scalar field and prints
/// per-stage timing, counts, and closure verdicts.
#[derive(Parser)]
#[command(name = "isocycle-bench", version)]
struct Cli {
    /// Path to the field (JSON array of rows).
    field_path: PathBuf,

    /// Stitching radius in grid cells.
    #[arg(long, default_value_t = GraphConfig::DEFAULT_NEIGHBOURHOOD_RADIUS)]
    radius: u32,

    /// Skip stitching of open fragments.
    #[arg(long)]
    no_stitch: bool,

    /// Wrap the field in a one-sample border of this value before
    /// processing.
    #[arg(long, allow_negative_numbers = true)]
    guard: Option<f64>,

    /// Write the cycle polylines to this file as JSON.
    #[arg(long)]
    polylines: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--radius` and `--no-stitch` are ignored.
    /// The JSON must be a valid `GraphConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Build a [`GraphConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<GraphConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(GraphConfig {
        neighbourhood_radius: cli.radius,
        stitch: !cli.no_stitch,
    })
}

/// Read the field file and build the grid, optionally guard-bordered.
fn load_grid(cli: &Cli) -> Result<ScalarGrid, String> {
    let text = std::fs::read_to_string(&cli.field_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.field_path.display()))?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(&text)
        .map_err(|e| format!("Error parsing {}: {e}", cli.field_path.display()))?;
    let grid = match cli.guard {
        Some(guard) => ScalarGrid::with_guard_border(&rows, guard),
        None => ScalarGrid::from_rows(&rows),
    };
    grid.map_err(|e| format!("Invalid field: {e}"))
}

/// Every live cycle of `graph` as a polyline.
fn cycle_polylines(graph: &ContourGraph) -> Vec<isocycle_core::Polyline> {
    (0..graph.cycles.cycles.len())
        .filter_map(|id| graph.cycle_polyline(CycleId::new(id)))
        .collect()
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let grid = match load_grid(&cli) {
        Ok(grid) => grid,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let shape = grid.shape();
    eprintln!(
        "Field: {} ({}x{} samples)",
        cli.field_path.display(),
        shape.nx,
        shape.ny,
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match isocycle_core::diagnostics::process_with_diagnostics(&grid, &config, &StdClock) {
            Ok((graph, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write polylines on the first run only.
                if run == 0
                    && let Some(ref path) = cli.polylines
                {
                    let polylines = cycle_polylines(&graph);
                    let written = serde_json::to_string(&polylines)
                        .map_err(|e| e.to_string())
                        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
                    match written {
                        Ok(()) => {
                            eprintln!(
                                "{} polylines written to {}",
                                polylines.len(),
                                path.display(),
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing polylines to {}: {e}", path.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[GraphDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means. Stage lists agree across runs with one config.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let names: Vec<&str> = all_diagnostics[0]
        .stages()
        .iter()
        .map(|(name, _)| *name)
        .collect();
    for (index, name) in names.iter().enumerate() {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stages().get(index).map(|(_, s)| s.duration))
            .map(|dur| dur.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
