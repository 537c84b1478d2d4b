//! Dense integer ids for grid-cell sides.
//!
//! A grid of `nx x ny` samples has two families of unit segments:
//!
//! - *row segments* join `(i, j)` and `(i, j + 1)`: `nx * (ny - 1)` of them,
//!   numbered first as `i * (ny - 1) + j`;
//! - *column segments* join `(i, j)` and `(i + 1, j)`: `(nx - 1) * ny` of
//!   them, numbered after the row segments as `i * ny + j`.
//!
//! The index space therefore holds exactly `nx * (ny - 1) + (nx - 1) * ny`
//! ids, all in use, with no reserved slot and no "minus one" offset. In
//! cell terms a `W x H` cell grid has `(W + 1) x (H + 1)` samples and
//! `(W + 1) * H + W * (H + 1)` sides. Size edge-indexed arrays with
//! [`edge_count`] rather than a hand-written formula.
//!
//! Neighbouring cells see the same id for the side they share.
//! Each side is *owned* by exactly one cell (the one allowed to write its
//! interpolated point): every cell owns its [`Side::Right`] and
//! [`Side::Top`], and cells on the first row/column also own the outer
//! [`Side::Bottom`] / [`Side::Left`] that no other cell touches.

use crate::types::{EdgeId, GridShape};

/// Side slot of a marching-squares cell with lower corner `(i, j)`.
///
/// The slot order is the one used by the configuration lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Slot 0: corners `(i, j)` and `(i, j + 1)`.
    Bottom = 0,
    /// Slot 1: corners `(i, j + 1)` and `(i + 1, j + 1)`.
    Right = 1,
    /// Slot 2: corners `(i + 1, j + 1)` and `(i + 1, j)`.
    Top = 2,
    /// Slot 3: corners `(i + 1, j)` and `(i, j)`.
    Left = 3,
}

impl Side {
    /// All sides in slot order.
    pub const ALL: [Self; 4] = [Self::Bottom, Self::Right, Self::Top, Self::Left];

    /// Slot index into [`cell_edges`] output.
    #[must_use]
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Corner offsets `(di, dj)` of the two samples bounding this side, in
    /// the traversal order of the corner bit weights.
    #[must_use]
    pub const fn corners(self) -> [(usize, usize); 2] {
        match self {
            Self::Bottom => [(0, 0), (0, 1)],
            Self::Right => [(0, 1), (1, 1)],
            Self::Top => [(1, 1), (1, 0)],
            Self::Left => [(1, 0), (0, 0)],
        }
    }

    /// Whether the cell at `(i, j)` writes the point of this side.
    #[must_use]
    pub const fn is_owned_by(self, i: usize, j: usize) -> bool {
        match self {
            Self::Right | Self::Top => true,
            Self::Bottom => i == 0,
            Self::Left => j == 0,
        }
    }
}

/// Cardinality of the edge index space for a grid shape.
///
/// Every id in `0..edge_count(shape)` names a real side; the last one is
/// `edge_count(shape) - 1`.
#[must_use]
pub const fn edge_count(shape: GridShape) -> usize {
    row_segment_count(shape) + shape.nx.saturating_sub(1) * shape.ny
}

const fn row_segment_count(shape: GridShape) -> usize {
    shape.nx * shape.ny.saturating_sub(1)
}

/// Id of the segment joining `(i, j)` and `(i, j + 1)`.
const fn row_segment(shape: GridShape, i: usize, j: usize) -> EdgeId {
    EdgeId::new(i * (shape.ny - 1) + j)
}

/// Id of the segment joining `(i, j)` and `(i + 1, j)`.
const fn column_segment(shape: GridShape, i: usize, j: usize) -> EdgeId {
    EdgeId::new(row_segment_count(shape) + i * shape.ny + j)
}

/// The four side ids of the cell with lower corner `(i, j)`, in
/// [`Side`] slot order.
///
/// The cell must exist: `i < nx - 1` and `j < ny - 1`.
#[must_use]
pub const fn cell_edges(shape: GridShape, i: usize, j: usize) -> [EdgeId; 4] {
    debug_assert!(i + 1 < shape.nx && j + 1 < shape.ny);
    [
        row_segment(shape, i, j),
        column_segment(shape, i, j + 1),
        row_segment(shape, i + 1, j),
        column_segment(shape, i, j),
    ]
}
