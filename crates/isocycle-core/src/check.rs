//! Read-only verification of cycle records and adjacency.
//!
//! A record is *closed* when following successors from its start for
//! exactly `length` steps lands back on the start. Both predicates below
//! are built on that single traversal. Records of length zero are retired
//! placeholders and are ignored.
//!
//! The `validate_*` functions check persisted or hand-built data before a
//! mutating pass runs over it.

use crate::build::Adjacency;
use crate::cycles::CycleSet;
use crate::types::{CycleId, CycleRecord, EdgeId, GraphError};

/// Follow `record.length` successor links from `record.start` and report
/// whether the walk returns to the start.
///
/// A missing successor or an out-of-range id along the way means the
/// record is not closed.
#[must_use]
pub fn flood_closes(next: &[Option<EdgeId>], record: &CycleRecord) -> bool {
    let mut current = record.start;
    for _ in 0..record.length {
        match next.get(current.index()).copied().flatten() {
            Some(successor) => current = successor,
            None => return false,
        }
    }
    current == record.start
}

/// `true` iff every non-retired record is closed.
#[must_use]
pub fn check_closure(next: &[Option<EdgeId>], cycles: &[CycleRecord]) -> bool {
    cycles
        .iter()
        .filter(|r| !r.is_retired())
        .all(|r| flood_closes(next, r))
}

/// `true` iff there is exactly one non-retired record and it is closed.
#[must_use]
pub fn check_single_cycle(next: &[Option<EdgeId>], cycles: &[CycleRecord]) -> bool {
    let mut active = cycles.iter().filter(|r| !r.is_retired());
    match (active.next(), active.next()) {
        (Some(only), None) => flood_closes(next, only),
        _ => false,
    }
}

/// Number of non-retired records that are not closed.
#[must_use]
pub fn open_count(next: &[Option<EdgeId>], cycles: &[CycleRecord]) -> usize {
    cycles
        .iter()
        .filter(|r| !r.is_retired() && !flood_closes(next, r))
        .count()
}

/// Check that `previous` and `next` mirror each other over an index space
/// of `expected_len` edges.
///
/// # Errors
///
/// Returns [`GraphError::ArrayLength`] for a wrongly sized array,
/// [`GraphError::EdgeOutOfRange`] for an id outside the index space, and
/// [`GraphError::InconsistentAdjacency`] at the first edge whose link is
/// not mirrored.
pub fn validate_adjacency(adjacency: &Adjacency, expected_len: usize) -> Result<(), GraphError> {
    for (name, array) in [("previous", &adjacency.previous), ("next", &adjacency.next)] {
        if array.len() != expected_len {
            return Err(GraphError::ArrayLength {
                name,
                expected: expected_len,
                actual: array.len(),
            });
        }
    }

    let lookup = |array: &[Option<EdgeId>], edge: EdgeId| -> Result<Option<EdgeId>, GraphError> {
        array
            .get(edge.index())
            .copied()
            .ok_or(GraphError::EdgeOutOfRange {
                edge,
                len: expected_len,
            })
    };

    for edge in (0..expected_len).map(EdgeId::new) {
        if let Some(successor) = adjacency.next[edge.index()]
            && lookup(&adjacency.previous, successor)? != Some(edge)
        {
            return Err(GraphError::InconsistentAdjacency { edge });
        }
        if let Some(predecessor) = adjacency.previous[edge.index()]
            && lookup(&adjacency.next, predecessor)? != Some(edge)
        {
            return Err(GraphError::InconsistentAdjacency { edge: predecessor });
        }
    }
    Ok(())
}

/// Check that the labels and records in `cycles` describe the chains of
/// `adjacency`.
///
/// Every label must name a live record. Every live record must walk its
/// own chain: `length` successor steps from `start` over edges carrying its
/// label, returning to `start` for a closed cycle or ending on a tail for an
/// open fragment whose `start` is a head. The walks together must cover
/// every labeled edge. Run [`validate_adjacency`] first; links are assumed
/// to be mirrored.
///
/// # Errors
///
/// Returns [`GraphError::ArrayLength`] if `cycle_index` does not match the
/// adjacency, [`GraphError::CycleOutOfRange`] for a label without a record,
/// [`GraphError::EdgeOutOfRange`] for a record start outside the index
/// space, and [`GraphError::RecordMismatch`] for any other disagreement.
pub fn validate_cycles(adjacency: &Adjacency, cycles: &CycleSet) -> Result<(), GraphError> {
    let len = adjacency.len();
    if cycles.cycle_index.len() != len {
        return Err(GraphError::ArrayLength {
            name: "cycle_index",
            expected: len,
            actual: cycles.cycle_index.len(),
        });
    }

    for (edge, label) in cycles.cycle_index.iter().enumerate() {
        let Some(cycle) = *label else { continue };
        let edge = EdgeId::new(edge);
        match cycles.record(cycle) {
            None => {
                return Err(GraphError::CycleOutOfRange {
                    edge,
                    cycle,
                    len: cycles.cycles.len(),
                });
            }
            Some(record) if record.is_retired() => {
                return Err(GraphError::RecordMismatch { cycle, edge });
            }
            Some(_) => {}
        }
    }

    let mut visited = vec![false; len];
    for (id, record) in cycles.active() {
        walk_record(adjacency, cycles, id, record, &mut visited)?;
    }

    for (edge, (label, &seen)) in cycles.cycle_index.iter().zip(&visited).enumerate() {
        if let Some(cycle) = *label
            && !seen
        {
            return Err(GraphError::RecordMismatch {
                cycle,
                edge: EdgeId::new(edge),
            });
        }
    }
    Ok(())
}

/// Walk one live record, marking the edges it covers.
fn walk_record(
    adjacency: &Adjacency,
    cycles: &CycleSet,
    id: CycleId,
    record: &CycleRecord,
    visited: &mut [bool],
) -> Result<(), GraphError> {
    let len = adjacency.len();
    let mismatch = |edge| GraphError::RecordMismatch { cycle: id, edge };
    let start = record.start;
    if start.index() >= len {
        return Err(GraphError::EdgeOutOfRange { edge: start, len });
    }
    if record.length > len {
        return Err(mismatch(start));
    }

    let mut current = start;
    for step in 0..=record.length {
        if step > 0 {
            current = match adjacency.next[current.index()] {
                Some(successor) if successor.index() < len => successor,
                Some(successor) => {
                    return Err(GraphError::EdgeOutOfRange {
                        edge: successor,
                        len,
                    });
                }
                None => return Err(mismatch(current)),
            };
            if current == start {
                return if step == record.length {
                    Ok(())
                } else {
                    Err(mismatch(current))
                };
            }
        }
        if cycles.cycle_of(current) != Some(id) || visited[current.index()] {
            return Err(mismatch(current));
        }
        visited[current.index()] = true;
    }

    // Open fragment: starts on a head and ends on a tail.
    if adjacency.previous.get(start.index()).copied().flatten().is_some() {
        return Err(mismatch(start));
    }
    if adjacency.next[current.index()].is_some() {
        return Err(mismatch(current));
    }
    Ok(())
}
