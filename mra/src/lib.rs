//! This library implements the [Multi-Resolution Approximation](https://doi.org/10.1080/01621459.2015.1123632)
//! (MRA) of spatial Gaussian processes, which makes kriging tractable on large point sets.
//!
//! Instead of the dense N x N covariance matrix of exact kriging, the spatial domain is
//! recursively partitioned in `J` subregions down to `M` levels. Each node of the tree selects
//! `r0` knots and only stores small covariance blocks conditional on the knots of its ancestors.
//! Observations are then aggregated with a two pass message passing algorithm over the tree
//! (bottom-up then top-down), giving the posterior mean and standard deviation at every location.
//!
//! The MRA is implemented by [MraTree] parameterized by [MraParams]. Covariance kernels
//! implement the [CovarianceModel](covariance_models::CovarianceModel) trait.
//!
//! ```no_run
//! use linfa::prelude::*;
//! use mrabox_mra::{ExponentialCov, MraTree};
//! use ndarray::{Array1, Array2};
//!
//! let locations = Array2::<f64>::zeros((100, 2));
//! let observations = Array1::<f64>::zeros(100);
//! let tree = MraTree::params(ExponentialCov::new(1., 0.3))
//!     .n_levels(2)
//!     .n_children(4)
//!     .n_knots(2)
//!     .fit(&Dataset::new(locations, observations))
//!     .expect("MRA tree built");
//! let (mean, std) = tree.predict().expect("tree is ready");
//! ```
#![warn(missing_docs)]

mod algorithm;
pub mod covariance_models;
mod errors;
pub mod linalg;
mod parameters;
pub mod partition;

mod knots;
mod posterior;
mod prior;
mod tree;
mod utils;

pub use algorithm::*;
pub use covariance_models::{
    CovarianceFn, CovarianceModel, ExponentialCov, Matern32Cov, Matern52Cov,
    SquaredExponentialCov,
};
pub use errors::*;
pub use knots::select_knots;
pub use linalg::Stabilization;
pub use parameters::*;
pub use tree::MraNode;
