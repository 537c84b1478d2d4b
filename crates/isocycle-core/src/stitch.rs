//! Stitching open contour fragments into closed cycles.
//!
//! A fragment that reaches the outer grid boundary stops there: its head
//! has no predecessor and its tail has no successor. Stitching links each
//! tail to the nearest head within the neighbourhood radius. Linking a
//! tail to a head (never tail to tail) keeps the negative region on the
//! left of every link, so any head is a compatible partner, including the
//! fragment's own head, which closes it.
//!
//! Tails are processed in increasing edge id, and distance ties go to the
//! smaller head id, so the result is deterministic. A head is consumed by
//! the link that reaches it and heads are never created, so one ordered
//! pass over the tails reaches the fixed point: a tail without a candidate
//! at its turn has none later either.
//!
//! Heads are indexed in an R\*-tree so each tail only inspects the heads
//! inside its search disc.

use rstar::RTree;
use rstar::primitives::GeomWithData;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::build::Adjacency;
use crate::check::{validate_adjacency, validate_cycles};
use crate::cycles::CycleSet;
use crate::edge_index::edge_count;
use crate::types::{CycleId, EdgeId, GraphError, GridShape, Point};

/// A head open end stored in the R\*-tree, tagged with its edge id.
type IndexedHead = GeomWithData<[f64; 2], EdgeId>;

/// What a stitching pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StitchSummary {
    /// Open fragments before stitching.
    pub open_fragments_before: usize,
    /// Links that joined two different fragments.
    pub merges: usize,
    /// Links that closed a fragment onto itself.
    pub closures: usize,
    /// Tails left without a head inside the radius.
    pub unresolved_ends: usize,
    /// Cycle records after stitching.
    pub cycles_after: usize,
}

/// An open end and where it sits.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenEnd {
    edge: EdgeId,
    point: Point,
}

/// Link open fragment ends that lie within `radius` grid cells of each
/// other, merging their cycle records.
///
/// `adjacency` and `cycles` are updated in place; the cycle list is
/// compacted afterwards, so ids stay dense. Ends that find no partner stay
/// open and are reported in the summary, not as an error.
///
/// # Errors
///
/// Returns [`GraphError::ArrayLength`] if any edge-indexed array does not
/// match `shape`, [`GraphError::EdgeOutOfRange`] /
/// [`GraphError::InconsistentAdjacency`] for malformed links,
/// [`GraphError::CycleOutOfRange`] / [`GraphError::RecordMismatch`] when
/// labels or records disagree with the links,
/// [`GraphError::UnlabeledEdge`] if cycles were not extracted, and
/// [`GraphError::MissingPoint`] for an open end without a point. All of
/// these are checked up front; nothing is modified when an error is
/// returned.
pub fn stitch(
    points: &[Option<Point>],
    adjacency: &mut Adjacency,
    cycles: &mut CycleSet,
    shape: GridShape,
    radius: u32,
) -> Result<StitchSummary, GraphError> {
    let len = edge_count(shape);
    for (name, actual) in [
        ("points", points.len()),
        ("cycle_index", cycles.cycle_index.len()),
    ] {
        if actual != len {
            return Err(GraphError::ArrayLength {
                name,
                expected: len,
                actual,
            });
        }
    }
    validate_adjacency(adjacency, len)?;
    validate_cycles(adjacency, cycles)?;

    let (heads, tails) = open_ends(points, adjacency, cycles)?;
    let mut summary = StitchSummary {
        open_fragments_before: heads.len(),
        ..StitchSummary::default()
    };

    let mut tree: RTree<IndexedHead> = RTree::bulk_load(
        heads
            .iter()
            .map(|h| IndexedHead::new([h.point.x, h.point.y], h.edge))
            .collect(),
    );
    let max_distance_2 = f64::from(radius).powi(2);

    for tail in &tails {
        let Some(head) = nearest_head(&tree, tail.point, max_distance_2) else {
            summary.unresolved_ends += 1;
            continue;
        };
        tree.remove(&IndexedHead::new([head.point.x, head.point.y], head.edge));

        if join(adjacency, cycles, tail.edge, head.edge)? {
            summary.merges += 1;
        } else {
            summary.closures += 1;
        }
        debug!(tail = %tail.edge, head = %head.edge, "stitched open ends");
    }

    cycles.compact();
    summary.cycles_after = cycles.cycles.len();

    info!(
        radius,
        open_before = summary.open_fragments_before,
        merges = summary.merges,
        closures = summary.closures,
        unresolved = summary.unresolved_ends,
        cycles = summary.cycles_after,
        "stitching finished"
    );

    Ok(summary)
}

/// Collect heads and tails in increasing edge id.
fn open_ends(
    points: &[Option<Point>],
    adjacency: &Adjacency,
    cycles: &CycleSet,
) -> Result<(Vec<OpenEnd>, Vec<OpenEnd>), GraphError> {
    let mut heads = Vec::new();
    let mut tails = Vec::new();
    for edge in (0..adjacency.len()).map(EdgeId::new) {
        let has_next = adjacency.next[edge.index()].is_some();
        let has_previous = adjacency.previous[edge.index()].is_some();
        let bucket = match (has_previous, has_next) {
            (false, true) => &mut heads,
            (true, false) => &mut tails,
            _ => continue,
        };
        if cycles.cycle_of(edge).is_none() {
            return Err(GraphError::UnlabeledEdge { edge });
        }
        let point = points[edge.index()].ok_or(GraphError::MissingPoint { edge })?;
        bucket.push(OpenEnd { edge, point });
    }
    Ok((heads, tails))
}

/// Closest head within the search disc; ties go to the smaller edge id.
fn nearest_head(tree: &RTree<IndexedHead>, from: Point, max_distance_2: f64) -> Option<OpenEnd> {
    tree.locate_within_distance([from.x, from.y], max_distance_2)
        .map(|entry| {
            let [x, y] = *entry.geom();
            OpenEnd {
                edge: entry.data,
                point: Point::new(x, y),
            }
        })
        .min_by(|a, b| {
            from.distance_squared(a.point)
                .total_cmp(&from.distance_squared(b.point))
                .then(a.edge.cmp(&b.edge))
        })
}

/// Link `tail -> head` and update the cycle records.
///
/// Returns `true` when two fragments merged and `false` when a fragment
/// closed onto itself.
fn join(
    adjacency: &mut Adjacency,
    cycles: &mut CycleSet,
    tail: EdgeId,
    head: EdgeId,
) -> Result<bool, GraphError> {
    let tail_cycle = cycles
        .cycle_of(tail)
        .ok_or(GraphError::UnlabeledEdge { edge: tail })?;
    let head_cycle = cycles
        .cycle_of(head)
        .ok_or(GraphError::UnlabeledEdge { edge: head })?;

    adjacency.link(tail, head);

    if tail_cycle == head_cycle {
        cycles.cycles[tail_cycle.index()].length += 1;
        return Ok(false);
    }

    let absorbed = std::mem::take(&mut cycles.cycles[head_cycle.index()].length);
    cycles.cycles[tail_cycle.index()].length += absorbed + 1;
    relabel_chain(adjacency, cycles, head, tail_cycle);
    Ok(true)
}

/// Label the open chain starting at `head` with `id`.
fn relabel_chain(adjacency: &Adjacency, cycles: &mut CycleSet, head: EdgeId, id: CycleId) {
    let mut current = head;
    loop {
        cycles.cycle_index[current.index()] = Some(id);
        match adjacency.next[current.index()] {
            Some(successor) if successor != head => current = successor,
            _ => break,
        }
    }
}
