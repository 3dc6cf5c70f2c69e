use linfa::Float;
use ndarray::Array2;

/// Spatial layout of a location set
///
/// A layout generates a fixed set of locations in a domain defined by `[lower_i, upper_i]^d`
/// within `R^d` where `d` is the spatial dimension.
pub trait LocationLayout<F: Float> {
    /// Returns the bounds of the domain
    ///
    /// # Returns
    ///
    /// * A (d, 2) matrix where the ith row is the interval of the ith coordinate.
    fn domain(&self) -> &Array2<F>;

    /// Number of locations of the layout
    fn n_locations(&self) -> usize;

    /// Generates the (n, d)-shaped array of locations belonging to `[0., 1.]^d`
    fn normalized_locations(&self) -> Array2<F>;

    /// Generates the (n, d)-shaped array of locations belonging to the domain
    fn locations(&self) -> Array2<F> {
        let domain = self.domain();
        let lower = domain.column(0);
        let scaler = &domain.column(1) - &lower;
        self.normalized_locations() * scaler + lower
    }
}
