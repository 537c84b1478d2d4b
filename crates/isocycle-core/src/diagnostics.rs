//! Pipeline diagnostics: timing, counts, and verdicts for each stage.
//!
//! [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records how long each took and what it
//! produced. Time is read through a caller-supplied [`Clock`], which keeps
//! this crate free of any platform timer.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ContourGraph;
use crate::build::{GraphGeometry, build_graph};
use crate::check;
use crate::cycles::extract_cycles;
use crate::edge_index::edge_count;
use crate::grid::{ScalarGrid, classify};
use crate::stitch::StitchSummary;
use crate::types::{GraphConfig, GraphError};

/// Source of monotonic time for stage measurements.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    /// Stage 1: sign classification.
    pub classify: StageDiagnostics,
    /// Stage 2: marching-squares graph construction.
    pub build: StageDiagnostics,
    /// Stage 3: cycle extraction.
    pub extract: StageDiagnostics,
    /// Stage 4: stitching (only when `config.stitch == true`).
    pub stitch: Option<StageDiagnostics>,
    /// Stage 5: closure verification.
    pub verify: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: GraphSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Sign classification metrics.
    Classify {
        /// Samples in the grid, guard border included.
        sample_count: usize,
        /// Samples classified as non-negative.
        positive_count: usize,
    },
    /// Graph construction metrics.
    Build {
        /// Size of the edge index space.
        edge_count: usize,
        /// Edges with an interpolated crossing.
        crossed_edges: usize,
        /// Successor links created.
        link_count: usize,
    },
    /// Cycle extraction metrics.
    Extract {
        /// Cycle records found.
        cycle_count: usize,
        /// Records that do not close.
        open_fragments: usize,
        /// Sum of record lengths.
        total_length: usize,
    },
    /// Stitching metrics.
    Stitch {
        /// Search radius in grid cells.
        radius: u32,
        /// What the pass did.
        summary: StitchSummary,
    },
    /// Verification metrics.
    Verify {
        /// Every record closes.
        closed: bool,
        /// Exactly one record, and it closes.
        single_cycle: bool,
        /// Records that do not close.
        open_records: usize,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    /// Samples along the first axis.
    pub nx: usize,
    /// Samples along the second axis.
    pub ny: usize,
    /// Size of the edge index space.
    pub edge_count: usize,
    /// Cycle records in the final graph.
    pub cycle_count: usize,
    /// Verdict of the closure check.
    pub closed: bool,
    /// Verdict of the single-cycle check.
    pub single_cycle: bool,
}

/// Run the pipeline and time every stage with `clock`.
///
/// Produces the same graph as [`process`](crate::process).
///
/// # Errors
///
/// Same as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    grid: &ScalarGrid,
    config: &GraphConfig,
    clock: &C,
) -> Result<(ContourGraph, GraphDiagnostics), GraphError> {
    config.validate()?;
    let shape = grid.shape();
    let pipeline_start = clock.now();

    // 1. Classify.
    let t = clock.now();
    let binary = classify(grid);
    let classify_stage = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Classify {
            sample_count: shape.sample_count(),
            positive_count: binary.positive_count(),
        },
    };

    // 2. Build.
    let t = clock.now();
    let GraphGeometry { points, adjacency } = build_graph(grid, &binary)?;
    let build_stage = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Build {
            edge_count: edge_count(shape),
            crossed_edges: points.iter().flatten().count(),
            link_count: adjacency.link_count(),
        },
    };

    // 3. Extract.
    let t = clock.now();
    let cycles = extract_cycles(&adjacency.next)?;
    let extract_stage = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Extract {
            cycle_count: cycles.cycles.len(),
            open_fragments: check::open_count(&adjacency.next, &cycles.cycles),
            total_length: cycles.total_length(),
        },
    };

    let mut graph = ContourGraph {
        shape,
        points,
        adjacency,
        cycles,
    };

    // 4. Stitch.
    let stitch_stage = if config.stitch {
        let t = clock.now();
        let summary = graph.stitch(config.neighbourhood_radius)?;
        Some(StageDiagnostics {
            duration: clock.elapsed(&t),
            metrics: StageMetrics::Stitch {
                radius: config.neighbourhood_radius,
                summary,
            },
        })
    } else {
        None
    };

    // 5. Verify.
    let t = clock.now();
    let closed = graph.check_closure();
    let single_cycle = graph.check_single_cycle();
    let open_records = graph.open_count();
    let verify_stage = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Verify {
            closed,
            single_cycle,
            open_records,
        },
    };
    if !closed {
        warn!(open = open_records, "contour graph has open fragments");
    }

    let diagnostics = GraphDiagnostics {
        classify: classify_stage,
        build: build_stage,
        extract: extract_stage,
        stitch: stitch_stage,
        verify: verify_stage,
        total_duration: clock.elapsed(&pipeline_start),
        summary: GraphSummary {
            nx: shape.nx,
            ny: shape.ny,
            edge_count: edge_count(shape),
            cycle_count: graph.cycles.cycles.len(),
            closed,
            single_cycle,
        },
    };

    Ok((graph, diagnostics))
}

impl GraphDiagnostics {
    /// Stages that ran, in pipeline order, with their report names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            ("Classify", &self.classify),
            ("Build", &self.build),
            ("Extract", &self.extract),
        ];
        if let Some(ref stitch) = self.stitch {
            stages.push(("Stitch", stitch));
        }
        stages.push(("Verify", &self.verify));
        stages
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Contour Graph Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Grid: {}x{} ({} edges)",
            self.summary.nx, self.summary.ny, self.summary.edge_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Cycles: {}  |  Closed: {}  |  Single cycle: {}",
            self.summary.cycle_count,
            verdict(self.summary.closed),
            verdict(self.summary.single_cycle),
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

const fn verdict(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Classify {
            sample_count,
            positive_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let share = if *sample_count > 0 {
                *positive_count as f64 / *sample_count as f64 * 100.0
            } else {
                0.0
            };
            format!("{sample_count} samples, {positive_count} positive ({share:.1}%)")
        }
        StageMetrics::Build {
            edge_count,
            crossed_edges,
            link_count,
        } => format!("{crossed_edges}/{edge_count} edges crossed, {link_count} links"),
        StageMetrics::Extract {
            cycle_count,
            open_fragments,
            total_length,
        } => format!("{cycle_count} cycles ({open_fragments} open), length {total_length}"),
        StageMetrics::Stitch { radius, summary } => format!(
            "r={radius} merges={} closures={} unresolved={} -> {} cycles",
            summary.merges, summary.closures, summary.unresolved_ends, summary.cycles_after,
        ),
        StageMetrics::Verify {
            closed,
            single_cycle,
            open_records,
        } => format!(
            "closed={} single={} open={open_records}",
            verdict(*closed),
            verdict(*single_cycle),
        ),
    }
}
