//! Shared types for the isocontour graph pipeline.

use serde::{Deserialize, Serialize};

/// Identifier of a grid-cell side: a vertex of the contour graph.
///
/// Edge ids are dense in `0..edge_count(shape)`. Id `0` is an ordinary
/// edge; "no edge" is always spelled `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(usize);

impl EdgeId {
    /// Wrap a raw edge index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw index into edge-indexed arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier of a cycle record (index into the cycle list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(usize);

impl CycleId {
    /// Wrap a raw cycle index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw index into the cycle list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A 2D point in grid-index coordinates.
///
/// `x` runs along the first grid axis and `y` along the second, so the
/// sample at `(i, j)` sits at `Point { x: i, y: j }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Position along the first grid axis.
    pub x: f64,
    /// Position along the second grid axis.
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Linear interpolation towards `other` by `t` in `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }
}

/// A sequence of connected points forming a path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Shape of a sample grid, guard border included.
///
/// `nx` counts samples along the first axis, `ny` along the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Sample count along the first axis.
    pub nx: usize,
    /// Sample count along the second axis.
    pub ny: usize,
}

impl GridShape {
    /// Smallest supported extent along either axis: one interior sample
    /// surrounded by the guard border.
    pub const MIN_EXTENT: usize = 3;

    /// Create a new shape.
    #[must_use]
    pub const fn new(nx: usize, ny: usize) -> Self {
        Self { nx, ny }
    }

    /// Total number of samples.
    #[must_use]
    pub const fn sample_count(self) -> usize {
        self.nx * self.ny
    }

    /// Number of marching-squares cells (one per lower-left sample that has
    /// a neighbour on both axes).
    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.nx.saturating_sub(1) * self.ny.saturating_sub(1)
    }

    /// Reject shapes too small to carry a guard border.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::GridTooSmall`] when either extent is below
    /// [`Self::MIN_EXTENT`].
    pub const fn validate(self) -> Result<(), GraphError> {
        if self.nx < Self::MIN_EXTENT || self.ny < Self::MIN_EXTENT {
            return Err(GraphError::GridTooSmall {
                nx: self.nx,
                ny: self.ny,
            });
        }
        Ok(())
    }
}

/// One cycle (or open fragment) of the contour graph.
///
/// `start` is the member the traversal began from: any vertex of a closed
/// cycle, the head of an open fragment. `length` counts successor links:
/// for a closed cycle that is also its vertex count, for an open fragment
/// it is one less.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// First edge visited by the traversal.
    pub start: EdgeId,
    /// Number of successor links in the cycle.
    pub length: usize,
}

impl CycleRecord {
    /// Create a new record.
    #[must_use]
    pub const fn new(start: EdgeId, length: usize) -> Self {
        Self { start, length }
    }

    /// Retired records (absorbed by a stitch) have zero length.
    #[must_use]
    pub const fn is_retired(&self) -> bool {
        self.length == 0
    }
}

/// Configuration for the contour graph pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Search radius for stitching open ends, in grid-cell units.
    pub neighbourhood_radius: u32,

    /// Whether [`process`](crate::process) stitches open fragments after
    /// extraction.
    pub stitch: bool,
}

impl GraphConfig {
    /// Default stitching radius.
    pub const DEFAULT_NEIGHBOURHOOD_RADIUS: u32 = 5;

    /// Largest radius accepted by [`Self::validate`].
    pub const MAX_NEIGHBOURHOOD_RADIUS: u32 = 1 << 20;

    /// Check the configuration for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConfig`] when the radius exceeds
    /// [`Self::MAX_NEIGHBOURHOOD_RADIUS`].
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.neighbourhood_radius > Self::MAX_NEIGHBOURHOOD_RADIUS {
            return Err(GraphError::InvalidConfig(format!(
                "neighbourhood_radius {} exceeds {}",
                self.neighbourhood_radius,
                Self::MAX_NEIGHBOURHOOD_RADIUS,
            )));
        }
        Ok(())
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            neighbourhood_radius: Self::DEFAULT_NEIGHBOURHOOD_RADIUS,
            stitch: true,
        }
    }
}

/// Structural precondition failures.
///
/// Open contours and unclosed cycles are not errors; they are reported by
/// the predicates in [`check`](crate::check).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The grid cannot hold an interior surrounded by a guard border.
    #[error("grid of {nx}x{ny} samples is smaller than the 3x3 minimum")]
    GridTooSmall {
        /// Samples along the first axis.
        nx: usize,
        /// Samples along the second axis.
        ny: usize,
    },

    /// The sample buffer does not match the declared shape.
    #[error("expected {expected} samples for the declared shape, got {actual}")]
    SampleCountMismatch {
        /// `nx * ny`.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// A sample is NaN or infinite.
    #[error("sample at ({i}, {j}) is not finite")]
    NonFiniteSample {
        /// First-axis index.
        i: usize,
        /// Second-axis index.
        j: usize,
    },

    /// Two grids that must share a shape do not.
    #[error("grid shape {expected:?} does not match {actual:?}")]
    ShapeMismatch {
        /// Shape of the reference grid.
        expected: GridShape,
        /// Shape of the offending grid.
        actual: GridShape,
    },

    /// An edge-indexed array has the wrong length.
    #[error("{name} has {actual} entries, expected {expected}")]
    ArrayLength {
        /// Which array.
        name: &'static str,
        /// Edge-index-space cardinality.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },

    /// An adjacency entry names an edge outside the index space.
    #[error("edge {edge} is outside the index space of {len} edges")]
    EdgeOutOfRange {
        /// The offending id.
        edge: EdgeId,
        /// Edge-index-space cardinality.
        len: usize,
    },

    /// `previous[next[e]] != e` for some edge.
    #[error("adjacency is inconsistent at edge {edge}")]
    InconsistentAdjacency {
        /// Edge whose successor does not point back to it.
        edge: EdgeId,
    },

    /// Two edges share the same successor.
    #[error("edge {successor} is the successor of both {first} and {second}")]
    DuplicateSuccessor {
        /// The shared successor.
        successor: EdgeId,
        /// Lower of the two predecessors.
        first: EdgeId,
        /// Higher of the two predecessors.
        second: EdgeId,
    },

    /// A linked edge carries no cycle label; cycles were not extracted
    /// from this adjacency.
    #[error("edge {edge} is linked but has no cycle label")]
    UnlabeledEdge {
        /// The unlabeled edge.
        edge: EdgeId,
    },

    /// An edge is labeled with a cycle id that has no record.
    #[error("edge {edge} is labeled {cycle} but only {len} cycle records exist")]
    CycleOutOfRange {
        /// The labeled edge.
        edge: EdgeId,
        /// The dangling label.
        cycle: CycleId,
        /// Number of cycle records.
        len: usize,
    },

    /// A cycle record does not describe the chain its start lies on.
    #[error("cycle {cycle} does not match its chain at edge {edge}")]
    RecordMismatch {
        /// The offending record.
        cycle: CycleId,
        /// Edge where the walk disagreed with the record.
        edge: EdgeId,
    },

    /// A linked edge has no interpolated point.
    #[error("edge {edge} is linked but has no point")]
    MissingPoint {
        /// The edge without a point.
        edge: EdgeId,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid graph configuration: {0}")]
    InvalidConfig(String),
}
