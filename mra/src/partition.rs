//! Recursive axis-aligned subdivision of the spatial domain.
//!
//! A node at level `l` splits its bounding box into `J` cells. `J` is factored into primes
//! which are dealt round-robin to the dimensions starting with dimension `l mod d`, so that
//! `J = 2` alternates the split axis by level and `J = 4` gives quadrants in 2-D.

use crate::errors::{MraError, Result};
use linfa::Float;
use ndarray::{Array1, ArrayBase, ArrayView1, Data, Ix2};
use ndarray_stats::QuantileExt;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of a tree node
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct Region<F: Float> {
    lower: Array1<F>,
    upper: Array1<F>,
}

impl<F: Float> Region<F> {
    /// Constructor given lower and upper corners
    pub fn new(lower: Array1<F>, upper: Array1<F>) -> Self {
        assert_eq!(lower.len(), upper.len());
        Region { lower, upper }
    }

    /// Bounding box of the given (n, d) locations
    pub fn from_locations(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        let mut lower = Array1::zeros(x.ncols());
        let mut upper = Array1::zeros(x.ncols());
        for (j, col) in x.columns().into_iter().enumerate() {
            lower[j] = *col.min().map_err(|e| {
                MraError::ConfigurationError(format!("Bad coordinates on axis {j}: {e}"))
            })?;
            upper[j] = *col.max().map_err(|e| {
                MraError::ConfigurationError(format!("Bad coordinates on axis {j}: {e}"))
            })?;
        }
        Ok(Region { lower, upper })
    }

    /// Lower corner
    pub fn lower(&self) -> &Array1<F> {
        &self.lower
    }

    /// Upper corner
    pub fn upper(&self) -> &Array1<F> {
        &self.upper
    }

    /// Spatial dimension
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Whether the point lies in the closed box
    pub fn contains(&self, point: ArrayView1<F>) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(&p, (&lo, &up))| lo <= p && p <= up)
    }

    /// Index of the cell along `axis` given the number of cells on this axis
    fn axis_cell(&self, axis: usize, n_cells: usize, value: F) -> usize {
        let width = (self.upper[axis] - self.lower[axis]) / F::cast(n_cells);
        if width.is_nan() || width <= F::zero() {
            return 0;
        }
        let k = ((value - self.lower[axis]) / width).floor();
        if k < F::zero() {
            0
        } else {
            k.to_usize().unwrap_or(n_cells - 1).min(n_cells - 1)
        }
    }

    /// Index of the child cell containing `point` for the per axis cell counts.
    ///
    /// Cells are numbered row-major, the first axis varying slowest.
    pub fn cell_index(&self, counts: &[usize], point: ArrayView1<F>) -> usize {
        counts
            .iter()
            .enumerate()
            .fold(0, |idx, (axis, &n)| idx * n + self.axis_cell(axis, n, point[axis]))
    }

    /// Splits the box into `prod(counts)` equal-width cells, numbered as in [`Region::cell_index`]
    pub fn split(&self, counts: &[usize]) -> Vec<Region<F>> {
        let n_cells: usize = counts.iter().product();
        (0..n_cells)
            .map(|c| {
                let mut lower = self.lower.clone();
                let mut upper = self.upper.clone();
                let mut rem = c;
                for axis in (0..counts.len()).rev() {
                    let n = counts[axis];
                    let k = rem % n;
                    rem /= n;
                    let width = (self.upper[axis] - self.lower[axis]) / F::cast(n);
                    lower[axis] = self.lower[axis] + width * F::cast(k);
                    upper[axis] = if k + 1 == n {
                        self.upper[axis]
                    } else {
                        self.lower[axis] + width * F::cast(k + 1)
                    };
                }
                Region { lower, upper }
            })
            .collect()
    }
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = vec![];
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// Number of cells along each of the `dim` axes when splitting a node of `level` into
/// `n_children` cells. The product of the counts is `n_children`.
pub fn split_counts(n_children: usize, dim: usize, level: usize) -> Vec<usize> {
    let mut counts = vec![1; dim];
    if dim == 0 {
        return counts;
    }
    let mut factors = prime_factors(n_children);
    factors.sort_unstable_by(|a, b| b.cmp(a));
    for (i, f) in factors.into_iter().enumerate() {
        counts[(level + i) % dim] *= f;
    }
    counts
}

/// Distributes `indices` (rows of `x`) among the cells of `region`, keeping their relative order
pub fn assign_points<F: Float>(
    region: &Region<F>,
    counts: &[usize],
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    indices: &[usize],
) -> Vec<Vec<usize>> {
    let n_cells: usize = counts.iter().product();
    let mut cells = vec![vec![]; n_cells];
    for &i in indices {
        cells[region.cell_index(counts, x.row(i))].push(i);
    }
    cells
}
