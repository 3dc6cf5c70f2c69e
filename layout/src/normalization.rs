//! Preprocessing conventions applied by callers before building an MRA tree:
//! coordinates are mapped into the unit hypercube, the grid shape of gridded data is
//! inferred from the unique coordinate values and observations are centered on the mean
//! of the non missing values.

use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_stats::QuantileExt;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Affine mapping of the location bounding box onto `[0, 1]^d`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct UnitScaling<F: Float> {
    lower: Array1<F>,
    range: Array1<F>,
}

impl<F: Float> UnitScaling<F> {
    /// Scaling of the bounding box of the given (n, d) locations.
    ///
    /// Degenerate axes (all coordinates equal) are mapped to 0.
    ///
    /// **Panics** if locations are empty or contain NaN values.
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        let lower = x.map_axis(Axis(0), |col| *col.min().expect("non empty coordinates"));
        let upper = x.map_axis(Axis(0), |col| *col.max().expect("non empty coordinates"));
        let range = &upper - &lower;
        UnitScaling { lower, range }
    }

    /// Lower corner of the bounding box
    pub fn lower(&self) -> &Array1<F> {
        &self.lower
    }

    /// Extent of the bounding box along each axis
    pub fn range(&self) -> &Array1<F> {
        &self.range
    }

    fn safe_range(&self) -> Array1<F> {
        self.range
            .mapv(|r| if r > F::zero() { r } else { F::one() })
    }

    /// Maps locations into the unit hypercube
    pub fn transform(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.lower) / self.safe_range()
    }

    /// Maps normalized locations back to the original coordinates
    pub fn inverse_transform(&self, xn: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        xn * &self.safe_range() + &self.lower
    }
}

/// Maps locations into the unit hypercube, returns normalized locations and the scaling used
pub fn normalize_locations<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> (Array2<F>, UnitScaling<F>) {
    let scaling = UnitScaling::new(x);
    (scaling.transform(x), scaling)
}

/// Number of unique coordinate values along each axis.
///
/// For locations laid out on a regular grid this is the grid shape.
pub fn grid_shape<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Vec<usize> {
    x.columns()
        .into_iter()
        .map(|col| {
            let mut values = col.to_vec();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            values.dedup();
            values.len()
        })
        .collect()
}

/// Subtracts the mean of the non missing (not NaN) observations.
///
/// Returns the centered observations and the mean (zero when every value is missing).
pub fn center_observations<F: Float>(z: &ArrayBase<impl Data<Elem = F>, Ix1>) -> (Array1<F>, F) {
    let (sum, count) = z
        .iter()
        .filter(|v| !v.is_nan())
        .fold((F::zero(), 0usize), |(s, c), &v| (s + v, c + 1));
    let mean = if count > 0 {
        sum / F::cast(count)
    } else {
        F::zero()
    };
    (z.mapv(|v| v - mean), mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_normalize_locations() {
        let x = array![[2., -1.], [4., 1.], [3., 0.]];
        let (xn, scaling) = normalize_locations(&x);
        assert_abs_diff_eq!(xn, array![[0., 0.], [1., 1.], [0.5, 0.5]], epsilon = 1e-12);
        assert_abs_diff_eq!(scaling.inverse_transform(&xn), x, epsilon = 1e-12);
        assert_eq!(scaling.lower(), &array![2., -1.]);
    }

    #[test]
    fn test_degenerate_axis() {
        let x = array![[2., 3.], [4., 3.]];
        let (xn, _) = normalize_locations(&x);
        assert_abs_diff_eq!(xn, array![[0., 0.], [1., 0.]], epsilon = 1e-12);
    }

    #[test]
    fn test_grid_shape() {
        let x = array![[0., 0.], [0., 0.5], [0., 1.], [1., 0.], [1., 0.5], [1., 1.]];
        assert_eq!(grid_shape(&x), vec![2, 3]);
    }

    #[test]
    fn test_center_observations() {
        let z = array![1., f64::NAN, 3., 2.];
        let (zc, mean) = center_observations(&z);
        assert_abs_diff_eq!(mean, 2., epsilon = 1e-12);
        assert_abs_diff_eq!(zc[0], -1., epsilon = 1e-12);
        assert!(zc[1].is_nan());

        let (zc, mean) = center_observations(&array![f64::NAN, f64::NAN]);
        assert_eq!(mean, 0.);
        assert!(zc.iter().all(|v| v.is_nan()));
    }
}
