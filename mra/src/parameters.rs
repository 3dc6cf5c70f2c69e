use crate::covariance_models::CovarianceModel;
use crate::errors::{MraError, Result};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default number of resolution levels below the root (M)
pub const MRA_DEFAULT_N_LEVELS: usize = 2;
/// Default number of children per node (J)
pub const MRA_DEFAULT_N_CHILDREN: usize = 4;
/// Default number of knots per node (r0)
pub const MRA_DEFAULT_N_KNOTS: usize = 2;
/// Default measurement error variance (R)
pub const MRA_DEFAULT_NOISE_VARIANCE: f64 = 1e-4;

/// Knot selection strategy among the points assigned to a node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum KnotSelection {
    /// Evenly spaced positions in the assigned index order
    #[default]
    Evenly,
    /// Reproducible random sampling, each node draws from its own stream derived from `seed`
    Randomized {
        /// Random generator seed
        seed: u64,
    },
}

/// A set of validated MRA parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Cov: Serialize",
        deserialize = "F: Deserialize<'de>, Cov: Deserialize<'de>"
    ))
)]
pub struct MraValidParams<F: Float, Cov: CovarianceModel<F>> {
    /// Covariance model of the spatial process
    pub(crate) cov: Cov,
    /// Number of resolution levels below the root (M)
    pub(crate) n_levels: usize,
    /// Number of children of each node (J)
    pub(crate) n_children: usize,
    /// Number of knots selected in each node (r0)
    pub(crate) n_knots: usize,
    /// Depth at which nodes become leaves, M + 1 when not given
    pub(crate) crit_depth: Option<usize>,
    /// Measurement error variance (R)
    pub(crate) noise_variance: F,
    /// Knot selection strategy
    pub(crate) knot_selection: KnotSelection,
    /// Parameter to improve numerical stability
    pub(crate) nugget: F,
}

impl<F: Float, Cov: CovarianceModel<F>> MraValidParams<F, Cov> {
    /// Get covariance model
    pub fn cov(&self) -> &Cov {
        &self.cov
    }

    /// Get number of levels below the root (M)
    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// Get number of children per node (J)
    pub fn n_children(&self) -> usize {
        self.n_children
    }

    /// Get number of knots per node (r0)
    pub fn n_knots(&self) -> usize {
        self.n_knots
    }

    /// Get critical depth, M + 1 unless explicitly set
    pub fn crit_depth(&self) -> usize {
        self.crit_depth.unwrap_or(self.n_levels + 1)
    }

    /// Level of the leaves: min(M, critDepth - 1)
    pub fn leaf_level(&self) -> usize {
        self.n_levels.min(self.crit_depth().saturating_sub(1))
    }

    /// Get measurement error variance (R)
    pub fn noise_variance(&self) -> F {
        self.noise_variance
    }

    /// Get knot selection strategy
    pub fn knot_selection(&self) -> KnotSelection {
        self.knot_selection
    }

    /// Get nugget
    pub fn nugget(&self) -> F {
        self.nugget
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the construction of
/// an [MRA tree](crate::MraTree).
pub struct MraParams<F: Float, Cov: CovarianceModel<F>>(MraValidParams<F, Cov>);

impl<F: Float, Cov: CovarianceModel<F>> MraParams<F, Cov> {
    /// A constructor for MRA parameters given the covariance model
    pub fn new(cov: Cov) -> MraParams<F, Cov> {
        Self(MraValidParams {
            cov,
            n_levels: MRA_DEFAULT_N_LEVELS,
            n_children: MRA_DEFAULT_N_CHILDREN,
            n_knots: MRA_DEFAULT_N_KNOTS,
            crit_depth: None,
            noise_variance: F::cast(MRA_DEFAULT_NOISE_VARIANCE),
            knot_selection: KnotSelection::default(),
            nugget: F::cast(100.0) * F::epsilon(),
        })
    }

    /// A constructor for MRA parameters from validated parameters
    pub fn new_from_valid(params: &MraValidParams<F, Cov>) -> Self {
        Self(params.clone())
    }

    /// Set covariance model.
    pub fn cov(mut self, cov: Cov) -> Self {
        self.0.cov = cov;
        self
    }

    /// Set the number of resolution levels below the root (M).
    ///
    /// M = 0 gives a single node tree, i.e. exact kriging.
    pub fn n_levels(mut self, n_levels: usize) -> Self {
        self.0.n_levels = n_levels;
        self
    }

    /// Set the number of children of each node (J).
    pub fn n_children(mut self, n_children: usize) -> Self {
        self.0.n_children = n_children;
        self
    }

    /// Set the number of knots selected in each node (r0).
    pub fn n_knots(mut self, n_knots: usize) -> Self {
        self.0.n_knots = n_knots;
        self
    }

    /// Set the depth at which nodes become leaves.
    ///
    /// Should be in `1..=M + 1`, leaves are then at level `min(M, crit_depth - 1)`.
    pub fn crit_depth(mut self, crit_depth: usize) -> Self {
        self.0.crit_depth = Some(crit_depth);
        self
    }

    /// Set the measurement error variance (R) added to every observation.
    pub fn noise_variance(mut self, noise_variance: F) -> Self {
        self.0.noise_variance = noise_variance;
        self
    }

    /// Set the knot selection strategy.
    pub fn knot_selection(mut self, knot_selection: KnotSelection) -> Self {
        self.0.knot_selection = knot_selection;
        self
    }

    /// Set nugget.
    ///
    /// Nugget is the base of the diagonal jitter used when a covariance block is singular
    pub fn nugget(mut self, nugget: F) -> Self {
        self.0.nugget = nugget;
        self
    }
}

impl<F: Float, Cov: CovarianceModel<F>> From<MraValidParams<F, Cov>> for MraParams<F, Cov> {
    fn from(valid: MraValidParams<F, Cov>) -> Self {
        MraParams(valid)
    }
}

impl<F: Float, Cov: CovarianceModel<F>> ParamGuard for MraParams<F, Cov> {
    type Checked = MraValidParams<F, Cov>;
    type Error = MraError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.n_children < 1 {
            return Err(MraError::ConfigurationError(
                "`n_children` (J) should be at least 1".to_string(),
            ));
        }
        let crit_depth = p.crit_depth();
        if crit_depth == 0 || crit_depth > p.n_levels + 1 {
            return Err(MraError::ConfigurationError(format!(
                "`crit_depth` ({}) should be in [1, M + 1 = {}]",
                crit_depth,
                p.n_levels + 1
            )));
        }
        if !p.noise_variance.is_finite() || p.noise_variance <= F::zero() {
            return Err(MraError::ConfigurationError(format!(
                "`noise_variance` (R) should be a positive finite value, got {}",
                p.noise_variance
            )));
        }
        if !p.nugget.is_finite() || p.nugget < F::zero() {
            return Err(MraError::ConfigurationError(format!(
                "`nugget` should be a non negative finite value, got {}",
                p.nugget
            )));
        }
        if crate::tree::n_nodes(p.n_children, p.leaf_level()).is_none() {
            return Err(MraError::ConfigurationError(format!(
                "Tree with {} children per node and {} levels is too large",
                p.n_children,
                p.leaf_level()
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance_models::ExponentialCov;

    fn params() -> MraParams<f64, ExponentialCov<f64>> {
        MraParams::new(ExponentialCov::new(1., 0.3))
    }

    #[test]
    fn test_default_params() {
        let p = params().check().expect("valid defaults");
        assert_eq!(p.n_levels(), 2);
        assert_eq!(p.n_children(), 4);
        assert_eq!(p.n_knots(), 2);
        assert_eq!(p.crit_depth(), 3);
        assert_eq!(p.leaf_level(), 2);
        assert_eq!(p.noise_variance(), 1e-4);
        assert_eq!(p.knot_selection(), KnotSelection::Evenly);
    }

    #[test]
    fn test_crit_depth_follows_levels() {
        let p = params().n_levels(5).check().unwrap();
        assert_eq!(p.crit_depth(), 6);
        let p = params().n_levels(5).crit_depth(3).check().unwrap();
        assert_eq!(p.leaf_level(), 2);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            params().n_children(0).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().n_levels(1).crit_depth(3).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().crit_depth(0).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().noise_variance(0.).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().noise_variance(f64::NAN).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().nugget(-1.).check(),
            Err(MraError::ConfigurationError(_))
        ));
        assert!(matches!(
            params().n_children(1000).n_levels(100).check(),
            Err(MraError::ConfigurationError(_))
        ));
    }
}
