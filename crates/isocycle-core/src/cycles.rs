//! Cycle discovery over the successor links.
//!
//! Edges are scanned in increasing id order. The first unlabeled edge with
//! a successor opens a new cycle id; the traversal then labels every member
//! and counts links. Ids are handed out in discovery order, so identical
//! input always yields identical labels.
//!
//! Open fragments (chains whose ends sit on the outer grid boundary) are
//! recorded from their head, the member without a predecessor, so that a
//! record's `start` plus `length` always describes the whole chain.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{CycleId, CycleRecord, EdgeId, GraphError};

/// Cycle labels and records for a contour graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleSet {
    /// Cycle of each edge; `None` for edges outside every cycle.
    pub cycle_index: Vec<Option<CycleId>>,
    /// One record per cycle, indexed by [`CycleId`].
    pub cycles: Vec<CycleRecord>,
}

impl CycleSet {
    /// Cycle containing `edge`, if any.
    #[must_use]
    pub fn cycle_of(&self, edge: EdgeId) -> Option<CycleId> {
        self.cycle_index.get(edge.index()).copied().flatten()
    }

    /// Record of cycle `id`.
    #[must_use]
    pub fn record(&self, id: CycleId) -> Option<&CycleRecord> {
        self.cycles.get(id.index())
    }

    /// Records that have not been absorbed by a stitch.
    pub fn active(&self) -> impl Iterator<Item = (CycleId, &CycleRecord)> {
        self.cycles
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_retired())
            .map(|(i, r)| (CycleId::new(i), r))
    }

    /// Sum of all record lengths. Equals the number of successor links.
    #[must_use]
    pub fn total_length(&self) -> usize {
        self.cycles.iter().map(|r| r.length).sum()
    }

    /// Drop retired records and renumber the survivors densely, keeping
    /// their relative order.
    pub fn compact(&mut self) {
        let mut remap = vec![None; self.cycles.len()];
        let mut kept = Vec::with_capacity(self.cycles.len());
        for (old, record) in self.cycles.iter().enumerate() {
            if !record.is_retired() {
                remap[old] = Some(CycleId::new(kept.len()));
                kept.push(*record);
            }
        }
        for label in &mut self.cycle_index {
            *label = label.and_then(|id| remap.get(id.index()).copied().flatten());
        }
        self.cycles = kept;
    }
}

/// Label every cycle of the successor links.
///
/// # Errors
///
/// Returns [`GraphError::EdgeOutOfRange`] for a successor outside the
/// index space and [`GraphError::DuplicateSuccessor`] when two edges share
/// a successor. Both are checked before any labeling starts.
pub fn extract_cycles(next: &[Option<EdgeId>]) -> Result<CycleSet, GraphError> {
    let predecessor = predecessors(next)?;

    let mut cycle_index = vec![None; next.len()];
    let mut cycles = Vec::new();
    for edge in (0..next.len()).map(EdgeId::new) {
        if cycle_index[edge.index()].is_some() || next[edge.index()].is_none() {
            continue;
        }
        let id = CycleId::new(cycles.len());
        let start = chain_head(&predecessor, edge);
        let length = flood(next, &mut cycle_index, start, id);
        cycles.push(CycleRecord::new(start, length));
    }

    debug!(
        cycles = cycles.len(),
        labeled_edges = cycle_index.iter().flatten().count(),
        "extracted cycles"
    );

    Ok(CycleSet {
        cycle_index,
        cycles,
    })
}

/// Invert the successor links, rejecting out-of-range and shared
/// successors.
pub(crate) fn predecessors(next: &[Option<EdgeId>]) -> Result<Vec<Option<EdgeId>>, GraphError> {
    let mut predecessor: Vec<Option<EdgeId>> = vec![None; next.len()];
    for (from, to) in next.iter().enumerate() {
        let Some(to) = *to else { continue };
        let from = EdgeId::new(from);
        let Some(slot) = predecessor.get_mut(to.index()) else {
            return Err(GraphError::EdgeOutOfRange {
                edge: to,
                len: next.len(),
            });
        };
        if let Some(first) = *slot {
            return Err(GraphError::DuplicateSuccessor {
                successor: to,
                first,
                second: from,
            });
        }
        *slot = Some(from);
    }
    Ok(predecessor)
}

/// Walk predecessors back to the member without one. On a closed cycle
/// the walk comes back to `edge`, which is then its own head.
fn chain_head(predecessor: &[Option<EdgeId>], edge: EdgeId) -> EdgeId {
    let mut head = edge;
    while let Some(prev) = predecessor[head.index()] {
        if prev == edge {
            return edge;
        }
        head = prev;
    }
    head
}

/// Label the chain or cycle starting at `start` with `id` and return its
/// link count.
fn flood(
    next: &[Option<EdgeId>],
    cycle_index: &mut [Option<CycleId>],
    start: EdgeId,
    id: CycleId,
) -> usize {
    cycle_index[start.index()] = Some(id);
    let mut length = 0;
    let mut current = start;
    while let Some(successor) = next[current.index()] {
        length += 1;
        if successor == start {
            break;
        }
        cycle_index[successor.index()] = Some(id);
        current = successor;
    }
    length
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Successor array over `len` edges from `(from, to)` pairs.
    fn links(len: usize, pairs: &[(usize, usize)]) -> Vec<Option<EdgeId>> {
        let mut next = vec![None; len];
        for &(a, b) in pairs {
            next[a] = Some(EdgeId::new(b));
        }
        next
    }

    fn e(i: usize) -> EdgeId {
        EdgeId::new(i)
    }

    #[test]
    fn no_links_no_cycles() {
        let set = extract_cycles(&[None; 5]).unwrap();
        assert!(set.cycles.is_empty());
        assert!(set.cycle_index.iter().all(Option::is_none));
    }

    #[test]
    fn edge_zero_is_an_ordinary_member() {
        let next = links(4, &[(0, 2), (2, 3), (3, 0)]);
        let set = extract_cycles(&next).unwrap();
        assert_eq!(set.cycles, [CycleRecord::new(e(0), 3)]);
        assert_eq!(set.cycle_of(e(0)), Some(CycleId::new(0)));
        assert_eq!(set.cycle_of(e(1)), None);
    }

    #[test]
    fn cycle_ids_follow_smallest_member() {
        let next = links(8, &[(5, 6), (6, 5), (1, 7), (7, 3), (3, 1)]);
        let set = extract_cycles(&next).unwrap();
        assert_eq!(
            set.cycles,
            [CycleRecord::new(e(1), 3), CycleRecord::new(e(5), 2)],
        );
        assert_eq!(set.cycle_of(e(7)), Some(CycleId::new(0)));
        assert_eq!(set.cycle_of(e(6)), Some(CycleId::new(1)));
    }

    #[test]
    fn open_chain_is_recorded_from_its_head() {
        // 4 -> 1 -> 6 -> 2: discovered at 1, rewound to head 4.
        let next = links(7, &[(4, 1), (1, 6), (6, 2)]);
        let set = extract_cycles(&next).unwrap();
        assert_eq!(set.cycles, [CycleRecord::new(e(4), 3)]);
        // The tail has no successor but still belongs to the fragment.
        assert_eq!(set.cycle_of(e(2)), Some(CycleId::new(0)));
        assert_eq!(set.cycle_of(e(0)), None);
    }

    #[test]
    fn lengths_sum_to_link_count() {
        let next = links(
            12,
            &[(0, 3), (3, 0), (2, 9), (9, 11), (11, 2), (4, 5), (5, 8), (10, 1)],
        );
        let set = extract_cycles(&next).unwrap();
        assert_eq!(set.cycles.len(), 4);
        assert_eq!(set.total_length(), next.iter().flatten().count());
    }

    #[test]
    fn rejects_out_of_range_successor() {
        let next = links(3, &[(0, 1)]);
        let mut bad = next;
        bad[2] = Some(e(3));
        assert_eq!(
            extract_cycles(&bad),
            Err(GraphError::EdgeOutOfRange { edge: e(3), len: 3 }),
        );
    }

    #[test]
    fn rejects_shared_successor() {
        let next = links(4, &[(0, 2), (1, 2), (2, 0)]);
        assert_eq!(
            extract_cycles(&next),
            Err(GraphError::DuplicateSuccessor {
                successor: e(2),
                first: e(0),
                second: e(1),
            }),
        );
    }

    #[test]
    fn compact_drops_retired_records_and_relabels() {
        let mut set = CycleSet {
            cycle_index: vec![
                Some(CycleId::new(0)),
                Some(CycleId::new(2)),
                None,
                Some(CycleId::new(2)),
            ],
            cycles: vec![
                CycleRecord::new(e(0), 1),
                CycleRecord::new(e(2), 0),
                CycleRecord::new(e(1), 2),
            ],
        };
        set.compact();
        assert_eq!(
            set.cycles,
            [CycleRecord::new(e(0), 1), CycleRecord::new(e(1), 2)],
        );
        assert_eq!(
            set.cycle_index,
            [
                Some(CycleId::new(0)),
                Some(CycleId::new(1)),
                None,
                Some(CycleId::new(1)),
            ],
        );
    }

    #[test]
    fn active_skips_retired_records() {
        let set = CycleSet {
            cycle_index: Vec::new(),
            cycles: vec![CycleRecord::new(e(0), 0), CycleRecord::new(e(3), 4)],
        };
        let active: Vec<_> = set.active().map(|(id, _)| id).collect();
        assert_eq!(active, [CycleId::new(1)]);
    }
}
