//! Scalar sample grids and their sign classification.
//!
//! Samples are stored first-axis-major: the sample at `(i, j)` lives at
//! `i * ny + j`. Classification is a pure per-sample map and runs on the
//! rayon pool.

use rayon::prelude::*;
use serde::Serialize;

use crate::types::{GraphError, GridShape};

/// Dense rectangular grid of scalar samples, guard border included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarGrid {
    shape: GridShape,
    samples: Vec<f64>,
}

impl ScalarGrid {
    /// Wrap a first-axis-major sample buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::GridTooSmall`] if either extent is below 3,
    /// [`GraphError::SampleCountMismatch`] if the buffer length is not
    /// `nx * ny`, and [`GraphError::NonFiniteSample`] for NaN or infinite
    /// samples.
    pub fn new(shape: GridShape, samples: Vec<f64>) -> Result<Self, GraphError> {
        shape.validate()?;
        if samples.len() != shape.sample_count() {
            return Err(GraphError::SampleCountMismatch {
                expected: shape.sample_count(),
                actual: samples.len(),
            });
        }
        if let Some(pos) = samples.iter().position(|v| !v.is_finite()) {
            return Err(GraphError::NonFiniteSample {
                i: pos / shape.ny,
                j: pos % shape.ny,
            });
        }
        Ok(Self { shape, samples })
    }

    /// Build a grid from rows indexed by the first axis.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SampleCountMismatch`] for ragged rows, plus
    /// every error of [`Self::new`].
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, GraphError> {
        let nx = rows.len();
        let ny = rows.first().map_or(0, Vec::len);
        let shape = GridShape::new(nx, ny);
        shape.validate()?;
        let mut samples = Vec::with_capacity(shape.sample_count());
        for row in rows {
            if row.len() != ny {
                return Err(GraphError::SampleCountMismatch {
                    expected: ny,
                    actual: row.len(),
                });
            }
            samples.extend_from_slice(row);
        }
        Self::new(shape, samples)
    }

    /// Build a grid by evaluating `f(i, j)` at every sample position.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_fn(
        shape: GridShape,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Result<Self, GraphError> {
        let samples = (0..shape.nx)
            .flat_map(|i| (0..shape.ny).map(move |j| (i, j)))
            .map(|(i, j)| f(i, j))
            .collect();
        Self::new(shape, samples)
    }

    /// Surround an interior field with a one-sample border of `guard`.
    ///
    /// `rows` is indexed by the first axis. The guard sign should match the
    /// sign of the interior samples along the rim so no contour reaches the
    /// outermost cells.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SampleCountMismatch`] for ragged or empty rows,
    /// [`GraphError::NonFiniteSample`] for a non-finite sample or guard.
    pub fn with_guard_border(rows: &[Vec<f64>], guard: f64) -> Result<Self, GraphError> {
        let inner_ny = rows.first().map_or(0, Vec::len);
        if inner_ny == 0 {
            return Err(GraphError::SampleCountMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(row) = rows.iter().find(|r| r.len() != inner_ny) {
            return Err(GraphError::SampleCountMismatch {
                expected: inner_ny,
                actual: row.len(),
            });
        }
        let shape = GridShape::new(rows.len() + 2, inner_ny + 2);
        Self::from_fn(shape, |i, j| {
            if i == 0 || j == 0 || i == shape.nx - 1 || j == shape.ny - 1 {
                guard
            } else {
                rows[i - 1][j - 1]
            }
        })
    }

    /// Grid shape, guard border included.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Sample at `(i, j)`.
    ///
    /// Panics if the position is outside the grid.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.samples[i * self.shape.ny + j]
    }

    /// All samples, first-axis-major.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// Sign classification of a [`ScalarGrid`]: `1` where the sample is
/// non-negative, `0` where it is negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryGrid {
    shape: GridShape,
    cells: Vec<u8>,
}

impl BinaryGrid {
    /// Grid shape, guard border included.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Classification at `(i, j)`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> u8 {
        self.cells[i * self.shape.ny + j]
    }

    /// Number of non-negative samples.
    #[must_use]
    pub fn positive_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 1).count()
    }
}

/// Classify every sample by sign. Zero counts as non-negative.
#[must_use]
pub fn classify(grid: &ScalarGrid) -> BinaryGrid {
    let cells = grid
        .samples()
        .par_iter()
        .map(|&v| u8::from(v >= 0.0))
        .collect();
    BinaryGrid {
        shape: grid.shape,
        cells,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_sample_count() {
        let result = ScalarGrid::new(GridShape::new(3, 3), vec![1.0; 8]);
        assert_eq!(
            result,
            Err(GraphError::SampleCountMismatch {
                expected: 9,
                actual: 8,
            }),
        );
    }

    #[test]
    fn new_rejects_small_grid() {
        let result = ScalarGrid::new(GridShape::new(2, 3), vec![1.0; 6]);
        assert!(matches!(result, Err(GraphError::GridTooSmall { .. })));
    }

    #[test]
    fn new_rejects_nan() {
        let mut samples = vec![1.0; 12];
        samples[7] = f64::NAN;
        let result = ScalarGrid::new(GridShape::new(3, 4), samples);
        assert_eq!(result, Err(GraphError::NonFiniteSample { i: 1, j: 3 }));
    }

    #[test]
    fn from_rows_is_first_axis_major() {
        let grid = ScalarGrid::from_rows(&[
            vec![0.0, 1.0, 2.0],
            vec![3.0, 4.0, 5.0],
            vec![6.0, 7.0, 8.0],
        ])
        .unwrap();
        assert!((grid.get(1, 2) - 5.0).abs() < f64::EPSILON);
        assert!((grid.get(2, 0) - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let result = ScalarGrid::from_rows(&[vec![0.0; 3], vec![0.0; 2], vec![0.0; 3]]);
        assert!(matches!(
            result,
            Err(GraphError::SampleCountMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn guard_border_wraps_interior() {
        let grid = ScalarGrid::with_guard_border(&[vec![-1.0, -2.0]], 1.0).unwrap();
        assert_eq!(grid.shape(), GridShape::new(3, 4));
        assert!((grid.get(1, 1) + 1.0).abs() < f64::EPSILON);
        assert!((grid.get(1, 2) + 2.0).abs() < f64::EPSILON);
        for j in 0..4 {
            assert!((grid.get(0, j) - 1.0).abs() < f64::EPSILON);
            assert!((grid.get(2, j) - 1.0).abs() < f64::EPSILON);
        }
        assert!((grid.get(1, 0) - 1.0).abs() < f64::EPSILON);
        assert!((grid.get(1, 3) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn classify_treats_zero_as_non_negative() {
        let grid = ScalarGrid::from_rows(&[
            vec![1.0, 0.0, -0.0],
            vec![-1.0, -1e-12, 2.0],
            vec![3.0, 3.0, 3.0],
        ])
        .unwrap();
        let binary = classify(&grid);
        assert_eq!(binary.shape(), grid.shape());
        assert_eq!(binary.cells, [1, 1, 1, 0, 0, 1, 1, 1, 1]);
        assert_eq!(binary.positive_count(), 7);
        assert_eq!(binary.get(1, 0), 0);
    }
}
