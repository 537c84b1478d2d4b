//! isocycle-core: Marching-squares isocontour graphs (sans-IO).
//!
//! Turns a sampled scalar field into the zero isocontour, represented as a
//! directed graph over the sides of the grid cells:
//! classify -> build -> extract cycles -> optional stitch -> verify.
//!
//! Every contour is oriented so the negative region lies on its left. Each
//! crossed cell side carries one interpolated point, and each contour
//! fragment inside a cell contributes one `previous`/`next` link. Cycles
//! are labeled and their closure checked by following `next`.
//!
//! This crate has **no I/O dependencies**. Loading fields and printing
//! reports lives in `isocycle-bench`.

pub mod build;
pub mod check;
pub mod cycles;
pub mod diagnostics;
pub mod edge_index;
pub mod grid;
pub mod stitch;
pub mod types;

pub use build::{Adjacency, GraphGeometry, build_graph};
pub use check::{check_closure, check_single_cycle, validate_cycles};
pub use cycles::{CycleSet, extract_cycles};
pub use grid::{BinaryGrid, ScalarGrid, classify};
pub use stitch::{StitchSummary, stitch};
pub use types::{
    CycleId, CycleRecord, EdgeId, GraphConfig, GraphError, GridShape, Point, Polyline,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A contour graph together with its cycle labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourGraph {
    /// Shape of the sampled grid the graph was built from.
    pub shape: GridShape,
    /// Interpolated crossing per edge; `None` where the side is not crossed.
    pub points: Vec<Option<Point>>,
    /// Directed contour links.
    pub adjacency: Adjacency,
    /// Cycle labels and records.
    pub cycles: CycleSet,
}

impl ContourGraph {
    /// `true` iff every cycle record is closed.
    #[must_use]
    pub fn check_closure(&self) -> bool {
        check::check_closure(&self.adjacency.next, &self.cycles.cycles)
    }

    /// `true` iff the graph is exactly one closed cycle.
    #[must_use]
    pub fn check_single_cycle(&self) -> bool {
        check::check_single_cycle(&self.adjacency.next, &self.cycles.cycles)
    }

    /// Number of records that do not close.
    #[must_use]
    pub fn open_count(&self) -> usize {
        check::open_count(&self.adjacency.next, &self.cycles.cycles)
    }

    /// Stitch open fragments whose ends lie within `radius` cells.
    ///
    /// # Errors
    ///
    /// See [`stitch::stitch`].
    pub fn stitch(&mut self, radius: u32) -> Result<StitchSummary, GraphError> {
        stitch::stitch(
            &self.points,
            &mut self.adjacency,
            &mut self.cycles,
            self.shape,
            radius,
        )
    }

    /// Points of cycle `id` in traversal order, starting at its record's
    /// start edge.
    ///
    /// A closed cycle repeats its first point at the end. Returns `None`
    /// for an unknown or retired id, or when the walk runs off the graph.
    #[must_use]
    pub fn cycle_polyline(&self, id: CycleId) -> Option<Polyline> {
        let record = self.cycles.record(id).filter(|r| !r.is_retired())?;
        let point_at = |edge: EdgeId| self.points.get(edge.index()).copied().flatten();

        let mut current = record.start;
        let mut points = Vec::with_capacity(record.length + 1);
        points.push(point_at(current)?);
        for _ in 0..record.length {
            current = self.adjacency.next.get(current.index()).copied().flatten()?;
            points.push(point_at(current)?);
        }
        Some(Polyline::new(points))
    }
}

/// Classify, build and label a scalar field in one call.
///
/// Fragments that reach the outer boundary are left open; see [`process`]
/// to stitch them.
///
/// # Errors
///
/// Returns [`GraphError`] only for structurally invalid input; a grid
/// with no contour yields an empty graph.
pub fn to_graph(grid: &ScalarGrid) -> Result<ContourGraph, GraphError> {
    let binary = classify(grid);
    let GraphGeometry { points, adjacency } = build_graph(grid, &binary)?;
    let cycles = extract_cycles(&adjacency.next)?;
    Ok(ContourGraph {
        shape: grid.shape(),
        points,
        adjacency,
        cycles,
    })
}

/// Run the full pipeline.
///
/// # Pipeline steps
///
/// 1. Sign classification
/// 2. Marching-squares graph construction
/// 3. Cycle extraction
/// 4. Optional stitching of open fragments
/// 5. Closure verification (logged, not enforced)
///
/// # Errors
///
/// Returns [`GraphError::InvalidConfig`] for an out-of-range radius and
/// any structural error from the stages.
pub fn process(grid: &ScalarGrid, config: &GraphConfig) -> Result<ContourGraph, GraphError> {
    config.validate()?;

    // 1-3. Classify, build, extract.
    let mut graph = to_graph(grid)?;

    // 4. Stitch.
    if config.stitch {
        graph.stitch(config.neighbourhood_radius)?;
    }

    // 5. Verify.
    if !graph.check_closure() {
        warn!(
            open = graph.open_count(),
            cycles = graph.cycles.cycles.len(),
            "contour graph has open fragments"
        );
    }

    Ok(graph)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 6x6 field whose negative region is the central 2x2 block.
    #[allow(clippy::cast_precision_loss)]
    fn blob() -> ScalarGrid {
        ScalarGrid::from_fn(GridShape::new(6, 6), |i, j| {
            let (x, y) = (i as f64 - 2.5, j as f64 - 2.5);
            x.mul_add(x, y * y) - 1.44
        })
        .unwrap()
    }

    /// 6x6 field with a negative band across the first axis, cut open by
    /// the grid boundary on both ends.
    fn band() -> ScalarGrid {
        ScalarGrid::from_fn(GridShape::new(6, 6), |i, _| {
            if (2..=3).contains(&i) { -1.0 } else { 1.0 }
        })
        .unwrap()
    }

    #[test]
    fn to_graph_labels_single_blob() {
        let graph = to_graph(&blob()).unwrap();
        assert_eq!(graph.cycles.cycles.len(), 1);
        assert_eq!(graph.cycles.cycles[0].length, 8);
        assert!(graph.check_closure());
        assert!(graph.check_single_cycle());
        assert_eq!(graph.points.iter().flatten().count(), 8);
    }

    #[test]
    fn to_graph_on_uniform_field_is_empty() {
        let grid = ScalarGrid::from_fn(GridShape::new(4, 5), |_, _| 2.0).unwrap();
        let graph = to_graph(&grid).unwrap();
        assert!(graph.cycles.cycles.is_empty());
        assert_eq!(graph.adjacency.link_count(), 0);
        // Vacuously closed, but not a single cycle.
        assert!(graph.check_closure());
        assert!(!graph.check_single_cycle());
    }

    #[test]
    fn process_stitches_band_into_one_cycle() {
        let graph = process(&band(), &GraphConfig::default()).unwrap();
        assert_eq!(
            graph.cycles.cycles,
            [CycleRecord::new(EdgeId::new(41), 12)],
        );
        assert!(graph.check_single_cycle());
    }

    #[test]
    fn process_without_stitching_keeps_fragments_open() {
        let config = GraphConfig {
            stitch: false,
            ..GraphConfig::default()
        };
        let graph = process(&band(), &config).unwrap();
        assert_eq!(graph.cycles.cycles.len(), 2);
        assert_eq!(graph.open_count(), 2);
        assert!(!graph.check_closure());
    }

    #[test]
    fn process_rejects_invalid_config() {
        let config = GraphConfig {
            neighbourhood_radius: GraphConfig::MAX_NEIGHBOURHOOD_RADIUS + 1,
            ..GraphConfig::default()
        };
        assert!(matches!(
            process(&blob(), &config),
            Err(GraphError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cycle_polyline_walks_closed_cycle() {
        let graph = to_graph(&blob()).unwrap();
        let polyline = graph.cycle_polyline(CycleId::new(0)).unwrap();
        assert_eq!(polyline.len(), 9);
        assert_eq!(polyline.first(), polyline.last());
        // Every crossing lies between the negative block and its neighbours.
        assert!(
            polyline
                .points()
                .iter()
                .all(|p| (1.0..=4.0).contains(&p.x) && (1.0..=4.0).contains(&p.y))
        );
    }

    #[test]
    fn cycle_polyline_rejects_unknown_id() {
        let graph = to_graph(&blob()).unwrap();
        assert_eq!(graph.cycle_polyline(CycleId::new(1)), None);
    }

    #[test]
    fn graph_serializes_round_trip() {
        let graph = to_graph(&blob()).unwrap();
        let json = serde_json::to_string(&graph).unwrap();
        let back: ContourGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape, graph.shape);
        assert_eq!(back.adjacency, graph.adjacency);
        assert_eq!(back.cycles, graph.cycles);
        assert!(back.check_single_cycle());
    }
}
