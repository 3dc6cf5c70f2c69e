use crate::covariance_models::CovarianceModel;
use crate::errors::{MraError, Result};
use crate::parameters::{MraParams, MraValidParams};
use crate::posterior::{compute_posterior, NodePosterior};
use crate::prior::{compute_priors, NodePrior};
use crate::tree::{build_skeleton, MraNode};
use linfa::prelude::{DatasetBase, Fit, Float};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Progress of an [`MraTree`] through its construction stages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum TreeState {
    /// Partition and knots are available
    SkeletonBuilt,
    /// Conditional priors of every node are computed
    PriorsComputed,
    /// Posterior of every node is computed
    PosteriorComputed,
    /// Predictions are assembled, [`MraTree::predict`] can be called
    Ready,
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            TreeState::SkeletonBuilt => "SkeletonBuilt",
            TreeState::PriorsComputed => "PriorsComputed",
            TreeState::PosteriorComputed => "PosteriorComputed",
            TreeState::Ready => "Ready",
        };
        write!(f, "{s}")
    }
}

/// Multi-resolution approximation of a spatial gaussian process.
///
/// The spatial domain is recursively split in `J` subregions down to `M` levels. Each node
/// of the resulting tree selects `r0` knots among the points of its region which are not
/// already knots of an ancestor, leaves also hold their remaining (residual) points.
/// The prior covariance of the knots of a node is conditioned on the knots of its ancestors
/// (top-down pass), then observations are aggregated from the leaves to the root and the
/// posterior is resolved from the root to the leaves.
///
/// The result is the posterior mean and standard deviation of the noise free process at every
/// location, observed or not (missing observations are given as NaN).
///
/// With `M = 0`, `J = 1` or `r0 >= N` the approximation is exact kriging.
///
/// # Example
///
/// ```
/// use linfa::ParamGuard;
/// use mrabox_mra::{ExponentialCov, MraTree};
/// use ndarray::array;
///
/// let x = array![[0., 0.], [0., 1.], [1., 0.], [1., 1.]];
/// let z = array![1., f64::NAN, 0., f64::NAN];
/// let params = MraTree::params(ExponentialCov::new(1., 0.3))
///     .n_levels(1)
///     .n_children(2)
///     .n_knots(2)
///     .check()
///     .expect("valid parameters");
/// let tree = MraTree::build(&params, &x, &z).expect("MRA tree built");
/// let (mean, std) = tree.predict().expect("tree is ready");
/// assert!(mean[1] > 0. && mean[1] < 1.);
/// assert!(std[1] > std[0]);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Cov: Serialize",
        deserialize = "F: Deserialize<'de>, Cov: Deserialize<'de>"
    ))
)]
pub struct MraTree<F: Float, Cov: CovarianceModel<F>> {
    /// Parameters used to build the tree
    params: MraValidParams<F, Cov>,
    /// Locations (n, d)
    locations: Array2<F>,
    /// Node arena in level order
    nodes: Vec<MraNode<F>>,
    /// Prior of each node
    priors: Vec<NodePrior<F>>,
    /// Posterior of each node
    posteriors: Vec<NodePosterior<F>>,
    /// Non missing observations mask
    observed: Array1<bool>,
    /// Posterior mean at each location
    mean: Array1<F>,
    /// Posterior variance at each location
    variance: Array1<F>,
    state: TreeState,
}

impl<F: Float, Cov: CovarianceModel<F>> fmt::Display for MraTree<F, Cov> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MRA(cov={}, M={}, J={}, r0={}, leaf_level={}, nodes={}, locations={}, state={})",
            self.params.cov(),
            self.params.n_levels(),
            self.params.n_children(),
            self.params.n_knots(),
            self.leaf_level(),
            self.nodes.len(),
            self.locations.nrows(),
            self.state
        )
    }
}

impl<F: Float, Cov: CovarianceModel<F>> MraTree<F, Cov> {
    /// MRA parameters constructor
    pub fn params(cov: Cov) -> MraParams<F, Cov> {
        MraParams::new(cov)
    }

    /// Runs the whole pipeline: skeleton, priors, posterior and predictions assembly.
    ///
    /// `locations` is a (n, d) array, `observations` has n values, NaN meaning missing.
    pub fn build(
        params: &MraValidParams<F, Cov>,
        locations: &ArrayBase<impl Data<Elem = F>, Ix2>,
        observations: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<Self> {
        let now = Instant::now();
        info!(
            "Build MRA tree on {} locations with {}",
            locations.nrows(),
            params.cov()
        );
        let mut tree = Self::skeleton(params, locations)?;
        tree.compute_priors()?;
        tree.compute_posterior(observations)?;
        tree.finalize()?;
        info!(
            "MRA tree built in {:?} ({} nodes, {} stabilized solves)",
            now.elapsed(),
            tree.nodes.len(),
            tree.n_stabilized()
        );
        Ok(tree)
    }

    /// Partitions the locations and selects the knots of every node.
    pub fn skeleton(
        params: &MraValidParams<F, Cov>,
        locations: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<Self> {
        let (n, d) = locations.dim();
        if n == 0 {
            return Err(MraError::ConfigurationError(
                "Location set is empty".to_string(),
            ));
        }
        if d == 0 {
            return Err(MraError::ConfigurationError(
                "Locations should have at least one coordinate".to_string(),
            ));
        }
        if n < params.n_knots().max(1) {
            return Err(MraError::ConfigurationError(format!(
                "Not enough locations ({}) to select the {} knots of the root",
                n,
                params.n_knots()
            )));
        }
        if locations.iter().any(|v| !v.is_finite()) {
            return Err(MraError::ConfigurationError(
                "Locations should have finite coordinates".to_string(),
            ));
        }

        let now = Instant::now();
        let locations = locations.to_owned();
        let nodes = build_skeleton(
            &locations,
            params.n_children(),
            params.leaf_level(),
            params.n_knots(),
            params.knot_selection(),
        )?;
        debug!(
            "Skeleton: {} nodes down to level {} in {}ms",
            nodes.len(),
            params.leaf_level(),
            now.elapsed().as_millis()
        );

        Ok(MraTree {
            params: params.clone(),
            locations,
            nodes,
            priors: vec![],
            posteriors: vec![],
            observed: Array1::from_elem(n, false),
            mean: Array1::zeros(0),
            variance: Array1::zeros(0),
            state: TreeState::SkeletonBuilt,
        })
    }

    fn require(&self, allowed: &[TreeState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(MraError::PreconditionError(format!(
                "{} is not allowed in state {}",
                operation, self.state
            )))
        }
    }

    /// Top-down pass computing the prior of every node conditional on its ancestors.
    pub fn compute_priors(&mut self) -> Result<()> {
        self.require(&[TreeState::SkeletonBuilt], "compute_priors")?;
        let now = Instant::now();
        self.priors = compute_priors(
            self.params.cov(),
            &self.locations,
            &self.nodes,
            self.params.n_children(),
            self.params.leaf_level(),
            self.params.nugget(),
        )?;
        debug!(
            "Priors: {} nodes in {}ms",
            self.priors.len(),
            now.elapsed().as_millis()
        );
        self.state = TreeState::PriorsComputed;
        Ok(())
    }

    /// Bottom-up then top-down posterior passes given one observation per location
    /// (NaN values are missing).
    ///
    /// Can be called again on a computed tree to account for new observations on the same
    /// locations, the skeleton and the priors are reused.
    pub fn compute_posterior(
        &mut self,
        observations: &ArrayBase<impl Data<Elem = F>, Ix1>,
    ) -> Result<()> {
        self.require(
            &[
                TreeState::PriorsComputed,
                TreeState::PosteriorComputed,
                TreeState::Ready,
            ],
            "compute_posterior",
        )?;
        if observations.len() != self.locations.nrows() {
            return Err(MraError::ConfigurationError(format!(
                "Observations count ({}) should match locations count ({})",
                observations.len(),
                self.locations.nrows()
            )));
        }
        if observations.iter().any(|v| v.is_infinite()) {
            return Err(MraError::ConfigurationError(
                "Observations should be finite or NaN when missing".to_string(),
            ));
        }

        let now = Instant::now();
        let z = observations.to_owned();
        self.observed = z.mapv(|v| !v.is_nan());
        self.posteriors = compute_posterior(
            &self.nodes,
            &self.priors,
            &z,
            self.params.n_children(),
            self.params.leaf_level(),
            self.params.noise_variance(),
            self.params.nugget(),
        )?;
        debug!(
            "Posterior: {} observed values in {}ms",
            self.n_observed(),
            now.elapsed().as_millis()
        );
        self.mean = Array1::zeros(0);
        self.variance = Array1::zeros(0);
        self.state = TreeState::PosteriorComputed;
        Ok(())
    }

    /// Scatters node posteriors into mean and variance vectors aligned with the locations.
    pub fn finalize(&mut self) -> Result<()> {
        self.require(&[TreeState::PosteriorComputed], "finalize")?;
        let now = Instant::now();
        let n = self.locations.nrows();
        let mut mean = Array1::from_elem(n, F::nan());
        let mut variance = Array1::from_elem(n, F::nan());
        for (node, post) in self.nodes.iter().zip(self.posteriors.iter()) {
            for (k, &i) in node.basis().iter().enumerate() {
                mean[i] = post.mean[k];
                variance[i] = post.variance[k];
            }
        }
        if mean.iter().chain(variance.iter()).any(|v| !v.is_finite()) {
            return Err(MraError::ArithmeticFailure(
                "Posterior contains non finite values".to_string(),
            ));
        }
        self.mean = mean;
        self.variance = variance;
        debug!(
            "Predictions assembled at {} locations in {}ms",
            n,
            now.elapsed().as_millis()
        );
        self.state = TreeState::Ready;
        Ok(())
    }

    /// Posterior mean and standard deviation at every location, in the input order.
    pub fn predict(&self) -> Result<(Array1<F>, Array1<F>)> {
        let variance = self.predict_var()?;
        Ok((self.mean.clone(), variance.mapv(|v| v.sqrt())))
    }

    /// Posterior variance at every location, in the input order.
    pub fn predict_var(&self) -> Result<Array1<F>> {
        self.require(&[TreeState::Ready], "predict")?;
        Ok(self.variance.clone())
    }

    /// Current construction stage
    pub fn state(&self) -> TreeState {
        self.state
    }

    /// Node arena, in level order
    pub fn nodes(&self) -> &[MraNode<F>] {
        &self.nodes
    }

    /// Node of the given id
    pub fn node(&self, id: usize) -> Option<&MraNode<F>> {
        self.nodes.get(id)
    }

    /// Prior covariance of the node variables (knots then residuals) conditional on
    /// the knots of its ancestors, available once priors are computed
    pub fn prior_covariance(&self, id: usize) -> Option<&Array2<F>> {
        self.priors.get(id).map(|p| p.covariance())
    }

    /// Level of the leaves
    pub fn leaf_level(&self) -> usize {
        self.params.leaf_level()
    }

    /// Number of block inversions which needed a regularization
    pub fn n_stabilized(&self) -> usize {
        self.priors
            .iter()
            .map(|p| p.stabilization)
            .chain(self.posteriors.iter().map(|p| p.stabilization))
            .filter(|s| s.is_stabilized())
            .count()
    }

    /// Mask of the non missing observations
    pub fn observed(&self) -> &Array1<bool> {
        &self.observed
    }

    fn n_observed(&self) -> usize {
        self.observed.iter().filter(|o| **o).count()
    }

    /// Locations the tree was built on
    pub fn locations(&self) -> &Array2<F> {
        &self.locations
    }

    /// Parameters the tree was built with
    pub fn valid_params(&self) -> &MraValidParams<F, Cov> {
        &self.params
    }
}

impl<F: Float, Cov: CovarianceModel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, MraError> for MraValidParams<F, Cov>
{
    type Object = MraTree<F, Cov>;

    /// Build the MRA tree given locations as records and observations as targets
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        MraTree::build(self, dataset.records(), dataset.targets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance_models::{ExponentialCov, Matern32Cov};
    use crate::parameters::KnotSelection;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::Dataset;
    use linfa::ParamGuard;
    use linfa_linalg::{cholesky::*, triangular::*};
    use ndarray::{array, Array, Axis};
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::rand_distr::{Normal, Uniform};
    use ndarray_rand::RandomExt;
    use rand_xoshiro::Xoshiro256Plus;

    /// Exact kriging of the noise free process given the non missing observations
    fn dense_kriging<Cov: CovarianceModel<f64>>(
        cov: &Cov,
        x: &Array2<f64>,
        z: &Array1<f64>,
        noise: f64,
    ) -> (Array1<f64>, Array1<f64>) {
        let obs: Vec<usize> = (0..z.len()).filter(|&i| !z[i].is_nan()).collect();
        let xo = x.select(Axis(0), &obs);
        let zo = z.select(Axis(0), &obs).insert_axis(Axis(1));
        let koo = cov.evaluate(xo.view(), xo.view()) + Array2::<f64>::eye(obs.len()) * noise;
        let kxo = cov.evaluate(x.view(), xo.view());
        let l = koo.cholesky().unwrap();
        let li = l.solve_triangular(&Array2::eye(obs.len()), UPLO::Lower).unwrap();
        let a = li.dot(&kxo.t());
        let mean = a.t().dot(&li.dot(&zo)).remove_axis(Axis(1));
        let var = cov.evaluate(x.view(), x.view()).diag().to_owned() - (&a * &a).sum_axis(Axis(0));
        (mean, var)
    }

    fn grid(n: usize) -> Array2<f64> {
        let step = 1. / (n - 1) as f64;
        Array::from_shape_fn((n * n, 2), |(i, j)| {
            if j == 0 {
                (i / n) as f64 * step
            } else {
                (i % n) as f64 * step
            }
        })
    }

    fn random_field(x: &Array2<f64>, seed: u64) -> Array1<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        let noise = Array1::random_using(x.nrows(), Normal::new(0., 0.1).unwrap(), &mut rng);
        x.column(0).mapv(|v| (3. * v).sin()) + x.column(1).mapv(|v| (2. * v).cos()) + noise
    }

    #[test]
    fn test_four_points_scenario() {
        let x = array![[0., 0.], [0., 1.], [1., 0.], [1., 1.]];
        let z = array![1., f64::NAN, 0., f64::NAN];
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(1)
            .n_children(2)
            .n_knots(2)
            .crit_depth(2)
            .noise_variance(1e-4)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert_eq!(tree.state(), TreeState::Ready);
        assert_eq!(tree.observed(), &array![true, false, true, false]);

        let (mean, std) = tree.predict().unwrap();
        assert!(mean[1] > 0. && mean[1] < 1., "mean = {mean}");
        assert!(std[1] > std[0], "std = {std}");
        assert_abs_diff_eq!(mean[1], f64::exp(-1. / 0.3), epsilon = 1e-3);

        // exact here as the leaves hold one point each
        let (expected_mean, expected_var) = dense_kriging(params.cov(), &x, &z, 1e-4);
        assert_abs_diff_eq!(mean, expected_mean, epsilon = 1e-6);
        assert_abs_diff_eq!(tree.predict_var().unwrap(), expected_var, epsilon = 1e-6);
    }

    #[test]
    fn test_single_node_is_kriging() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let x = Array2::random_using((40, 2), Uniform::new(0., 1.), &mut rng);
        let mut z = random_field(&x, 0);
        z[3] = f64::NAN;
        z[17] = f64::NAN;
        let cov = Matern32Cov::new(1., 0.4);
        let params = MraTree::params(cov)
            .n_levels(0)
            .n_knots(5)
            .noise_variance(0.01)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert_eq!(tree.nodes().len(), 1);

        let (mean, var) = dense_kriging(&cov, &x, &z, 0.01);
        assert_abs_diff_eq!(tree.predict().unwrap().0, mean, epsilon = 1e-6);
        assert_abs_diff_eq!(tree.predict_var().unwrap(), var, epsilon = 1e-6);
    }

    #[test]
    fn test_chain_is_kriging() {
        let mut rng = Xoshiro256Plus::seed_from_u64(7);
        let x = Array2::random_using((30, 2), Uniform::new(0., 1.), &mut rng);
        let z = random_field(&x, 1);
        let cov = ExponentialCov::new(1., 0.5);
        let params = MraTree::params(cov)
            .n_levels(3)
            .n_children(1)
            .n_knots(4)
            .noise_variance(0.01)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert_eq!(tree.nodes().len(), 4);
        assert_eq!(tree.leaf_level(), 3);

        let (mean, var) = dense_kriging(&cov, &x, &z, 0.01);
        assert_abs_diff_eq!(tree.predict().unwrap().0, mean, epsilon = 1e-6);
        assert_abs_diff_eq!(tree.predict_var().unwrap(), var, epsilon = 1e-6);
    }

    #[test]
    fn test_root_knots_cover_all_points() {
        let x = grid(5);
        let z = random_field(&x, 2);
        let cov = ExponentialCov::new(1., 0.3);
        let params = MraTree::params(cov)
            .n_levels(2)
            .n_knots(25)
            .noise_variance(0.01)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert_eq!(tree.nodes()[0].knots().len(), 25);

        let (mean, var) = dense_kriging(&cov, &x, &z, 0.01);
        assert_abs_diff_eq!(tree.predict().unwrap().0, mean, epsilon = 1e-6);
        assert_abs_diff_eq!(tree.predict_var().unwrap(), var, epsilon = 1e-6);
    }

    #[test]
    fn test_partition_of_locations() {
        let x = grid(12);
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(3)
            .n_children(4)
            .n_knots(3)
            .check()
            .unwrap();
        let tree = MraTree::skeleton(&params, &x).unwrap();
        assert_eq!(tree.state(), TreeState::SkeletonBuilt);
        assert_eq!(tree.nodes().len(), 85);

        let mut count = vec![0; x.nrows()];
        for node in tree.nodes() {
            for &i in node.knots().iter().chain(node.residuals()) {
                count[i] += 1;
            }
            assert_eq!(tree.node(node.id()).map(|n| n.level()), Some(node.level()));
            if node.level() < tree.leaf_level() {
                assert!(node.residuals().is_empty());
                assert_eq!(node.children().len(), 4);
            } else {
                assert!(node.children().is_empty());
            }
        }
        assert!(count.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_determinism() {
        let x = grid(15);
        let z = random_field(&x, 3);
        for selection in [KnotSelection::Evenly, KnotSelection::Randomized { seed: 42 }] {
            let params = MraTree::params(ExponentialCov::new(1., 0.2))
                .knot_selection(selection)
                .check()
                .unwrap();
            let (m1, s1) = MraTree::build(&params, &x, &z).unwrap().predict().unwrap();
            let (m2, s2) = MraTree::build(&params, &x, &z).unwrap().predict().unwrap();
            assert_eq!(m1, m2);
            assert_eq!(s1, s2);
        }
    }

    #[test]
    fn test_monotonic_uncertainty() {
        let x = grid(10);
        let mut z = random_field(&x, 4);
        // only observe the lower left corner
        for (i, row) in x.rows().into_iter().enumerate() {
            if row[0] > 0.3 || row[1] > 0.3 {
                z[i] = f64::NAN;
            }
        }
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .noise_variance(1e-4)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        let (_, std) = tree.predict().unwrap();
        // (0, 0) is observed, (1, 1) is far from any observation
        assert!(std[x.nrows() - 1] >= std[0]);
        assert!(std[0] < 0.05);
    }

    #[test]
    fn test_missing_band() {
        let x = grid(16);
        let mut z = random_field(&x, 5);
        for (i, row) in x.rows().into_iter().enumerate() {
            if row[0] > 0.4 && row[0] < 0.6 {
                z[i] = f64::NAN;
            }
        }
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(2)
            .n_children(4)
            .n_knots(4)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        let (mean, std) = tree.predict().unwrap();
        assert!(mean.iter().all(|v| v.is_finite()));
        assert!(std.iter().all(|v| v.is_finite() && *v >= 0.));
        let missing = tree.observed().iter().filter(|o| !**o).count();
        assert!(missing > 0);
    }

    #[test]
    fn test_all_missing() {
        let x = grid(6);
        let z = Array1::from_elem(x.nrows(), f64::NAN);
        let params = MraTree::params(ExponentialCov::new(2., 0.3))
            .n_levels(1)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        let (mean, std) = tree.predict().unwrap();
        // prior is recovered
        assert_abs_diff_eq!(mean, Array1::<f64>::zeros(x.nrows()), epsilon = 1e-12);
        assert_abs_diff_eq!(std, Array1::from_elem(x.nrows(), f64::sqrt(2.)), epsilon = 1e-6);
    }

    #[test]
    fn test_empty_nodes() {
        // all points in one corner, most cells of the regular tree are empty
        let x = array![[0., 0.], [0.01, 0.], [0., 0.01], [0.02, 0.02], [1., 1.]];
        let z = array![1., 0.9, f64::NAN, 0.8, 0.];
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(3)
            .n_children(4)
            .n_knots(1)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert!(tree.nodes().iter().any(|n| n.knots().is_empty()));
        let (mean, std) = tree.predict().unwrap();
        assert!(mean.iter().chain(std.iter()).all(|v| v.is_finite()));
    }

    #[test]
    fn test_duplicate_locations() {
        let x = array![[0., 0.], [0.5, 0.5], [0.5, 0.5], [1., 1.]];
        let z = array![0., 1., 1.1, 0.];
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(0)
            .n_knots(4)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        assert!(tree.n_stabilized() > 0);
        let (mean, std) = tree.predict().unwrap();
        assert!(mean.iter().chain(std.iter()).all(|v: &f64| v.is_finite()));
        assert_abs_diff_eq!(mean[1], mean[2], epsilon = 1e-3);
    }

    #[test]
    fn test_staged_api_preconditions() {
        let x = grid(4);
        let z = random_field(&x, 6);
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(1)
            .check()
            .unwrap();
        let mut tree = MraTree::skeleton(&params, &x).unwrap();
        assert!(matches!(tree.predict(), Err(MraError::PreconditionError(_))));
        assert!(matches!(
            tree.compute_posterior(&z),
            Err(MraError::PreconditionError(_))
        ));
        assert!(matches!(tree.finalize(), Err(MraError::PreconditionError(_))));

        assert!(tree.prior_covariance(0).is_none());
        tree.compute_priors().unwrap();
        assert_eq!(tree.state(), TreeState::PriorsComputed);
        let xr = x.select(Axis(0), tree.nodes()[0].knots());
        assert_abs_diff_eq!(
            tree.prior_covariance(0).unwrap(),
            &params.cov().evaluate(xr.view(), xr.view()),
            epsilon = 1e-12
        );
        assert!(matches!(
            tree.compute_priors(),
            Err(MraError::PreconditionError(_))
        ));
        assert!(matches!(tree.predict_var(), Err(MraError::PreconditionError(_))));

        tree.compute_posterior(&z).unwrap();
        assert_eq!(tree.state(), TreeState::PosteriorComputed);
        assert!(matches!(tree.predict(), Err(MraError::PreconditionError(_))));

        tree.finalize().unwrap();
        assert_eq!(tree.state(), TreeState::Ready);
        let (mean, _) = tree.predict().unwrap();

        // new observations on the same layout reuse skeleton and priors
        let z2 = &z * 2.;
        tree.compute_posterior(&z2).unwrap();
        tree.finalize().unwrap();
        let (mean2, _) = tree.predict().unwrap();
        assert_abs_diff_eq!(mean2, &mean * 2., epsilon = 1e-10);
    }

    #[test]
    fn test_invalid_data() {
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_knots(3)
            .check()
            .unwrap();
        let x = array![[0., 0.], [1., 1.]];
        assert!(matches!(
            MraTree::build(&params, &x, &array![1., 2.]),
            Err(MraError::ConfigurationError(_))
        ));
        let x = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            MraTree::skeleton(&params, &x),
            Err(MraError::ConfigurationError(_))
        ));
        let x = Array2::<f64>::zeros((4, 0));
        assert!(matches!(
            MraTree::skeleton(&params, &x),
            Err(MraError::ConfigurationError(_))
        ));
        let x = array![[0., 0.], [1., f64::NAN], [0., 1.]];
        assert!(matches!(
            MraTree::skeleton(&params, &x),
            Err(MraError::ConfigurationError(_))
        ));
        let x = array![[0., 0.], [1., 1.], [0., 1.]];
        assert!(matches!(
            MraTree::build(&params, &x, &array![1., 2.]),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            MraTree::build(&params, &x, &array![1., f64::INFINITY, 0.]),
            Err(MraError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_fit_with_dataset() {
        let x = grid(8);
        let z = random_field(&x, 8);
        let tree = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(2)
            .fit(&Dataset::new(x.clone(), z.clone()))
            .expect("MRA fit");
        let params = tree.valid_params().clone();
        let built = MraTree::build(&params, &x, &z).unwrap();
        assert_eq!(tree.predict().unwrap(), built.predict().unwrap());
        assert!(tree.to_string().starts_with("MRA(cov=Exponential"));
    }

    #[cfg(feature = "serializable")]
    #[test]
    fn test_save_load() {
        let x = grid(6);
        let z = random_field(&x, 10);
        let params = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_levels(1)
            .check()
            .unwrap();
        let tree = MraTree::build(&params, &x, &z).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let loaded: MraTree<f64, ExponentialCov<f64>> = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.state(), TreeState::Ready);
        assert_abs_diff_eq!(
            loaded.predict().unwrap().0,
            tree.predict().unwrap().0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fit_invalid_params() {
        let x = grid(4);
        let z = random_field(&x, 9);
        let res = MraTree::params(ExponentialCov::new(1., 0.3))
            .n_children(0)
            .fit(&Dataset::new(x, z));
        assert!(matches!(res, Err(MraError::ConfigurationError(_))));
    }
}
