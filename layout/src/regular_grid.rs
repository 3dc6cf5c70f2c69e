use crate::LocationLayout;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A regular grid with a given number of nodes along each axis.
///
/// Locations are ordered row-major: the first coordinate varies slowest,
/// so that values given at the locations can be reshaped to the grid shape.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct RegularGrid<F: Float> {
    /// Domain definition as a (d, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of the ith coordinate
    xlimits: Array2<F>,
    /// Number of grid nodes along each axis
    shape: Vec<usize>,
}

impl<F: Float> RegularGrid<F> {
    /// Constructor given a (d, 2) domain matrix \[\[lower bound, upper bound\], ...\]
    /// and the number of nodes along each of the d axes
    ///
    /// ```
    /// use mrabox_layout::{LocationLayout, RegularGrid};
    /// use ndarray::arr2;
    ///
    /// let grid = RegularGrid::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]), &[3, 2]);
    /// assert_eq!(grid.locations().dim(), (6, 2));
    /// ```
    ///
    /// **Panics** if xlimits number of columns is different from 2 or if shape length
    /// differs from the domain dimension.
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, shape: &[usize]) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        if xlimits.nrows() != shape.len() {
            panic!(
                "grid shape length ({}) must match domain dimension ({})",
                shape.len(),
                xlimits.nrows()
            );
        }
        RegularGrid {
            xlimits: xlimits.to_owned(),
            shape: shape.to_vec(),
        }
    }

    /// Number of grid nodes along each axis
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl<F: Float> LocationLayout<F> for RegularGrid<F> {
    fn domain(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn n_locations(&self) -> usize {
        self.shape.iter().product()
    }

    fn normalized_locations(&self) -> Array2<F> {
        let d = self.shape.len();
        let axes: Vec<_> = self
            .shape
            .iter()
            .map(|&n| {
                if n == 1 {
                    Array::from_elem(1, F::cast(0.5))
                } else {
                    Array::linspace(F::zero(), F::one(), n)
                }
            })
            .collect();
        Array2::from_shape_fn((self.n_locations(), d), |(i, j)| {
            let stride: usize = self.shape[j + 1..].iter().product();
            axes[j][(i / stride) % self.shape[j]]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array};

    #[test]
    fn test_regular_grid() {
        let xlimits = arr2(&[[0., 1.], [5., 10.]]);
        let expected = array![
            [0., 5.],
            [0., 10.],
            [0.5, 5.],
            [0.5, 10.],
            [1., 5.],
            [1., 10.]
        ];
        let actual = RegularGrid::new(&xlimits, &[3, 2]).locations();
        assert_abs_diff_eq!(expected, actual, epsilon = 1e-12);
    }

    #[test]
    fn test_single_node_axis() {
        let grid = RegularGrid::new(&arr2(&[[0., 2.], [0., 1.]]), &[1, 3]);
        let actual = grid.locations();
        assert_eq!(grid.n_locations(), 3);
        assert_abs_diff_eq!(actual.column(0).to_owned(), array![1., 1., 1.], epsilon = 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_bad_shape() {
        RegularGrid::new(&arr2(&[[0., 1.], [0., 1.]]), &[3]);
    }
}
