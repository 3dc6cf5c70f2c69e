use crate::LocationLayout;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt};
use rand_xoshiro::Xoshiro256Plus;

/// Irregular layout of locations drawn uniformly in the domain.
pub struct RandomLayout<F: Float, R: Rng + Clone> {
    /// Domain definition as a (d, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of the ith coordinate
    xlimits: Array2<F>,
    /// Number of locations
    n: usize,
    /// Random generator used for reproducibility
    rng: R,
}

impl<F: Float> RandomLayout<F, Xoshiro256Plus> {
    /// Constructor given a (d, 2) domain matrix \[\[lower bound, upper bound\], ...\]
    /// and the number of locations
    ///
    /// ```
    /// use mrabox_layout::{LocationLayout, RandomLayout};
    /// use ndarray::arr2;
    ///
    /// let layout = RandomLayout::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]), 50);
    /// assert_eq!(layout.locations().dim(), (50, 2));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, n: usize) -> Self {
        Self::new_with_rng(xlimits, n, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng + Clone> RandomLayout<F, R> {
    /// Constructor given a (d, 2) domain matrix, the number of locations
    /// and a random generator for reproducibility
    ///
    /// **Panics** if xlimits number of columns is different from 2.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, n: usize, rng: R) -> Self {
        if xlimits.ncols() != 2 {
            panic!("xlimits must have 2 columns (lower, upper)");
        }
        RandomLayout {
            xlimits: xlimits.to_owned(),
            n,
            rng,
        }
    }

    /// Set random generator
    pub fn with_rng<R2: Rng + Clone>(self, rng: R2) -> RandomLayout<F, R2> {
        RandomLayout {
            xlimits: self.xlimits,
            n: self.n,
            rng,
        }
    }
}

impl<F: Float, R: Rng + Clone> LocationLayout<F> for RandomLayout<F, R> {
    fn domain(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn n_locations(&self) -> usize {
        self.n
    }

    fn normalized_locations(&self) -> Array2<F> {
        let mut rng = self.rng.clone();
        let d = self.xlimits.nrows();
        Array::random_using((self.n, d), Uniform::new(0., 1.), &mut rng).mapv(|v| F::cast(v))
    }
}
