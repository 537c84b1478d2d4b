//! Marching-squares graph construction.
//!
//! Every cell classifies its four corners into a 4-bit configuration code
//! (weights 1, 2, 4, 8 for corners `(i, j)`, `(i, j + 1)`, `(i + 1, j + 1)`,
//! `(i + 1, j)`) and emits up to two directed links between its crossed
//! sides. Links are oriented so that the negative region lies to the left.
//!
//! The per-cell pass runs on the rayon pool. A cell only ever produces
//! points for the sides it owns (see [`Side::is_owned_by`]), and the
//! orientation rule gives every crossed side exactly one incoming and one
//! outgoing link across its two cells, so the scatter of per-cell results
//! never writes a slot twice.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edge_index::{Side, cell_edges, edge_count};
use crate::grid::{BinaryGrid, ScalarGrid};
use crate::types::{EdgeId, GraphError, Point};

/// Directed successor/predecessor links over the edge index space.
///
/// `None` means "no link"; every id, including `0`, is a real edge.
/// Links are only created inside the crate, by [`build_graph`] and by
/// stitching after validation:
///
/// ```compile_fail
/// use isocycle_core::{Adjacency, EdgeId};
///
/// let mut adjacency = Adjacency::new(4);
/// adjacency.link(EdgeId::new(0), EdgeId::new(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacency {
    /// Predecessor of each edge.
    pub previous: Vec<Option<EdgeId>>,
    /// Successor of each edge.
    pub next: Vec<Option<EdgeId>>,
}

impl Adjacency {
    /// Empty adjacency over `len` edges.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            previous: vec![None; len],
            next: vec![None; len],
        }
    }

    /// Size of the edge index space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next.len()
    }

    /// Returns `true` for an empty index space.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Set `next[from] = to` and `previous[to] = from`.
    ///
    /// Callers must pass in-range ids whose slots are still free; public
    /// entry points validate first.
    pub(crate) fn link(&mut self, from: EdgeId, to: EdgeId) {
        debug_assert!(self.next[from.index()].is_none(), "{from} already has a successor");
        debug_assert!(self.previous[to.index()].is_none(), "{to} already has a predecessor");
        self.next[from.index()] = Some(to);
        self.previous[to.index()] = Some(from);
    }

    /// Number of successor links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.next.iter().flatten().count()
    }
}

/// Output of [`build_graph`]: interpolated points and adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphGeometry {
    /// Zero crossing on each crossed edge; `None` for edges the contour
    /// does not cross.
    pub points: Vec<Option<Point>>,
    /// Directed links between crossed edges.
    pub adjacency: Adjacency,
}

/// Links emitted by one cell, as side slots `(from, to)`.
///
/// Codes 5 and 10 are saddles; the mean of the four corner samples picks
/// which pair of opposite corners the contour separates.
#[must_use]
pub fn cell_links(code: u8, corner_mean: f64) -> &'static [(Side, Side)] {
    use Side::{Bottom as B, Left as L, Right as R, Top as T};

    match code {
        1 => &[(B, L)],
        2 => &[(R, B)],
        3 => &[(R, L)],
        4 => &[(T, R)],
        5 if corner_mean > 0.0 => &[(B, R), (T, L)],
        5 => &[(B, L), (T, R)],
        6 => &[(T, B)],
        7 => &[(T, L)],
        8 => &[(L, T)],
        9 => &[(B, T)],
        10 if corner_mean < 0.0 => &[(R, B), (L, T)],
        10 => &[(L, B), (R, T)],
        11 => &[(R, T)],
        12 => &[(L, R)],
        13 => &[(B, R)],
        14 => &[(L, B)],
        _ => &[],
    }
}

/// Everything one cell contributes to the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CellContour {
    /// Points on crossed sides this cell owns.
    points: [Option<(EdgeId, Point)>; 4],
    /// Directed links through the cell.
    links: [Option<(EdgeId, EdgeId)>; 2],
}

/// Build the contour graph of `grid`.
///
/// # Errors
///
/// Returns [`GraphError::ShapeMismatch`] if `binary` was not classified
/// from a grid of the same shape.
pub fn build_graph(grid: &ScalarGrid, binary: &BinaryGrid) -> Result<GraphGeometry, GraphError> {
    let shape = grid.shape();
    if binary.shape() != shape {
        return Err(GraphError::ShapeMismatch {
            expected: shape,
            actual: binary.shape(),
        });
    }

    let cells_per_row = shape.ny - 1;
    let contours: Vec<CellContour> = (0..shape.cell_count())
        .into_par_iter()
        .filter_map(|cell| march_cell(grid, binary, cell / cells_per_row, cell % cells_per_row))
        .collect();

    let len = edge_count(shape);
    let mut points = vec![None; len];
    let mut adjacency = Adjacency::new(len);
    for contour in &contours {
        for &(edge, point) in contour.points.iter().flatten() {
            debug_assert!(points[edge.index()].is_none(), "point of {edge} written twice");
            points[edge.index()] = Some(point);
        }
        for &(from, to) in contour.links.iter().flatten() {
            adjacency.link(from, to);
        }
    }

    debug!(
        contour_cells = contours.len(),
        crossed_edges = points.iter().flatten().count(),
        links = adjacency.link_count(),
        "built contour graph"
    );

    Ok(GraphGeometry { points, adjacency })
}

/// Configuration code of the cell with lower corner `(i, j)`.
fn configuration(binary: &BinaryGrid, i: usize, j: usize) -> u8 {
    binary.get(i, j)
        + 2 * binary.get(i, j + 1)
        + 4 * binary.get(i + 1, j + 1)
        + 8 * binary.get(i + 1, j)
}

fn march_cell(grid: &ScalarGrid, binary: &BinaryGrid, i: usize, j: usize) -> Option<CellContour> {
    let code = configuration(binary, i, j);
    if code == 0 || code == 15 {
        return None;
    }

    let edges = cell_edges(grid.shape(), i, j);

    let mut points = [None; 4];
    for side in Side::ALL {
        if !side.is_owned_by(i, j) {
            continue;
        }
        let [(ai, aj), (bi, bj)] = side.corners();
        let (a, b) = ((i + ai, j + aj), (i + bi, j + bj));
        if binary.get(a.0, a.1) != binary.get(b.0, b.1) {
            points[side.slot()] = Some((edges[side.slot()], zero_crossing(grid, a, b)));
        }
    }

    let corner_mean = (grid.get(i, j)
        + grid.get(i, j + 1)
        + grid.get(i + 1, j + 1)
        + grid.get(i + 1, j))
        / 4.0;

    let mut links = [None; 2];
    for (slot, &(from, to)) in links.iter_mut().zip(cell_links(code, corner_mean)) {
        *slot = Some((edges[from.slot()], edges[to.slot()]));
    }

    Some(CellContour { points, links })
}

/// Linear interpolation of the zero crossing between two samples of
/// opposite sign class.
#[allow(clippy::cast_precision_loss)]
fn zero_crossing(grid: &ScalarGrid, a: (usize, usize), b: (usize, usize)) -> Point {
    let va = grid.get(a.0, a.1);
    let vb = grid.get(b.0, b.1);
    let denom = va - vb;
    let t = if denom == 0.0 { 0.5 } else { va / denom };
    Point::new(a.0 as f64, a.1 as f64).lerp(Point::new(b.0 as f64, b.1 as f64), t)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grid::classify;
    use crate::types::GridShape;

    /// 3x3 grid whose cell `(0, 0)` has the given corner values (in bit
    /// order); the remaining samples copy the nearest corner so the extra
    /// cells stay consistent.
    fn single_cell_grid(corners: [f64; 4]) -> ScalarGrid {
        let [c00, c01, c11, c10] = corners;
        ScalarGrid::from_rows(&[
            vec![c00, c01, c01],
            vec![c10, c11, c11],
            vec![c10, c11, c11],
        ])
        .unwrap()
    }

    fn corner_values(code: u8) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (bit, v) in out.iter_mut().enumerate() {
            *v = if code & (1 << bit) == 0 { -1.0 } else { 1.0 };
        }
        out
    }

    fn slot_links(grid: &ScalarGrid) -> Vec<(usize, usize)> {
        let binary = classify(grid);
        let edges = cell_edges(grid.shape(), 0, 0);
        let slot_of = |e: EdgeId| edges.iter().position(|&x| x == e).unwrap();
        march_cell(grid, &binary, 0, 0).map_or_else(Vec::new, |c| {
            c.links
                .iter()
                .flatten()
                .map(|&(a, b)| (slot_of(a), slot_of(b)))
                .collect()
        })
    }

    #[test]
    fn case_table_matches_unambiguous_codes() {
        let expected: [(u8, Vec<(usize, usize)>); 12] = [
            (1, vec![(0, 3)]),
            (2, vec![(1, 0)]),
            (3, vec![(1, 3)]),
            (4, vec![(2, 1)]),
            (6, vec![(2, 0)]),
            (7, vec![(2, 3)]),
            (8, vec![(3, 2)]),
            (9, vec![(0, 2)]),
            (11, vec![(1, 2)]),
            (12, vec![(3, 1)]),
            (13, vec![(0, 1)]),
            (14, vec![(3, 0)]),
        ];
        for (code, links) in expected {
            let grid = single_cell_grid(corner_values(code));
            assert_eq!(slot_links(&grid), links, "code {code}");
        }
    }

    #[test]
    fn trivial_codes_emit_nothing() {
        for code in [0, 15] {
            let grid = single_cell_grid(corner_values(code));
            assert!(slot_links(&grid).is_empty(), "code {code}");
        }
    }

    #[test]
    fn saddle_five_resolves_by_corner_mean() {
        // Positive corners 0 and 2.
        let high = single_cell_grid([3.0, -1.0, 3.0, -1.0]);
        assert_eq!(slot_links(&high), [(0, 1), (2, 3)]);

        let low = single_cell_grid([1.0, -3.0, 1.0, -3.0]);
        assert_eq!(slot_links(&low), [(0, 3), (2, 1)]);

        // A zero mean takes the non-positive branch.
        let even = single_cell_grid([1.0, -1.0, 1.0, -1.0]);
        assert_eq!(slot_links(&even), [(0, 3), (2, 1)]);
    }

    #[test]
    fn saddle_ten_resolves_by_corner_mean() {
        // Positive corners 1 and 3.
        let low = single_cell_grid([-3.0, 1.0, -3.0, 1.0]);
        assert_eq!(slot_links(&low), [(1, 0), (3, 2)]);

        let high = single_cell_grid([-1.0, 3.0, -1.0, 3.0]);
        assert_eq!(slot_links(&high), [(3, 0), (1, 2)]);

        // A zero mean takes the non-negative branch.
        let even = single_cell_grid([-1.0, 1.0, -1.0, 1.0]);
        assert_eq!(slot_links(&even), [(3, 0), (1, 2)]);
    }

    #[test]
    fn cell_writes_only_owned_crossed_sides() {
        // Code 1: sides 0 and 3 are crossed, and cell (0, 0) owns both
        // outer sides, so both get points. Sides 1 and 2 are not crossed.
        let grid = single_cell_grid([3.0, -1.0, -1.0, -1.0]);
        let binary = classify(&grid);
        let contour = march_cell(&grid, &binary, 0, 0).unwrap();
        let edges = cell_edges(grid.shape(), 0, 0);
        assert_eq!(contour.points[0], Some((edges[0], Point::new(0.0, 0.75))));
        assert_eq!(contour.points[3], Some((edges[3], Point::new(0.75, 0.0))));
        assert!(contour.points[1].is_none());
        assert!(contour.points[2].is_none());
    }

    #[test]
    fn inner_cell_skips_sides_it_does_not_own() {
        // Cell (1, 1) of a 4x4 grid only owns its right and top sides.
        let grid = ScalarGrid::from_fn(GridShape::new(4, 4), |i, j| {
            if i == 1 && j == 1 { 1.0 } else { -1.0 }
        })
        .unwrap();
        let binary = classify(&grid);
        let contour = march_cell(&grid, &binary, 1, 1).unwrap();
        assert!(contour.points[Side::Bottom.slot()].is_none());
        assert!(contour.points[Side::Left.slot()].is_none());
    }

    #[test]
    fn zero_crossing_interpolates_linearly() {
        let grid = single_cell_grid([2.0, -2.0, -2.0, -2.0]);
        let p = zero_crossing(&grid, (0, 0), (0, 1));
        assert_eq!(p, Point::new(0.0, 0.5));
        let grid = single_cell_grid([0.0, -2.0, -2.0, -2.0]);
        assert_eq!(zero_crossing(&grid, (0, 0), (1, 0)), Point::new(0.0, 0.0));
    }

    #[test]
    fn build_rejects_mismatched_binary_grid() {
        let a = ScalarGrid::new(GridShape::new(3, 3), vec![1.0; 9]).unwrap();
        let b = ScalarGrid::new(GridShape::new(3, 4), vec![1.0; 12]).unwrap();
        let result = build_graph(&a, &classify(&b));
        assert!(matches!(result, Err(GraphError::ShapeMismatch { .. })));
    }

    #[test]
    fn build_sizes_arrays_to_edge_space() {
        let grid = ScalarGrid::new(GridShape::new(5, 4), vec![1.0; 20]).unwrap();
        let geometry = build_graph(&grid, &classify(&grid)).unwrap();
        assert_eq!(geometry.points.len(), edge_count(grid.shape()));
        assert_eq!(geometry.adjacency.len(), edge_count(grid.shape()));
        assert_eq!(geometry.adjacency.link_count(), 0);
    }

    #[test]
    fn every_link_is_mirrored_and_every_linked_edge_has_a_point() {
        // Two negative blobs, one of them a saddle-heavy checkerboard.
        let grid = ScalarGrid::from_fn(GridShape::new(9, 9), |i, j| {
            let inner = (2..=6).contains(&i) && (2..=6).contains(&j);
            if inner && (i + j) % 2 == 0 { -1.0 } else { 0.5 }
        })
        .unwrap();
        let geometry = build_graph(&grid, &classify(&grid)).unwrap();
        let adjacency = &geometry.adjacency;
        assert!(adjacency.link_count() > 0);
        for (e, next) in adjacency.next.iter().enumerate() {
            if let Some(n) = next {
                assert_eq!(adjacency.previous[n.index()], Some(EdgeId::new(e)));
                assert!(geometry.points[e].is_some(), "e{e} has no point");
                assert!(geometry.points[n.index()].is_some());
            }
        }
    }

    #[test]
    fn build_is_deterministic() {
        let grid = ScalarGrid::from_fn(GridShape::new(12, 10), |i, j| {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (i as f64, j as f64);
            (x * 0.7).sin() + (y * 0.9).cos() - 0.2
        })
        .unwrap();
        let binary = classify(&grid);
        let first = build_graph(&grid, &binary).unwrap();
        let second = build_graph(&grid, &binary).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn build_ignores_thread_count() {
        let grid = ScalarGrid::from_fn(GridShape::new(40, 33), |i, j| {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = (i as f64, j as f64);
            (x * 0.37).sin() * (y * 0.29).cos() + (x * 0.11 + y * 0.13).sin() * 0.4
        })
        .unwrap();

        let run = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            pool.install(|| {
                let binary = classify(&grid);
                let geometry = build_graph(&grid, &binary).unwrap();
                let cycles = crate::cycles::extract_cycles(&geometry.adjacency.next).unwrap();
                (binary, geometry, cycles)
            })
        };

        let (binary, geometry, cycles) = run(1);
        assert!(geometry.adjacency.link_count() > 0);
        for threads in [2, 4, 8] {
            let (other_binary, other_geometry, other_cycles) = run(threads);
            assert_eq!(other_binary, binary, "{threads} threads");
            assert_eq!(other_geometry, geometry, "{threads} threads");
            assert_eq!(other_cycles, cycles, "{threads} threads");
        }
    }
}
