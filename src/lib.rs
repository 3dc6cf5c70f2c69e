//! `mrabox`, a toolbox for the multi-resolution approximation (MRA) of spatial gaussian processes.
//!
//! It gathers:
//! * [layout]: location layouts (regular grids, random layouts) and preprocessing conventions
//!   (normalization into the unit hypercube, grid shape inference, observation centering),
//! * [mra]: the MRA tree itself, giving posterior mean and standard deviation of a noisy
//!   spatial process at every location.
//!
//! # Example
//!
//! ```
//! use approx::assert_abs_diff_eq;
//! use mrabox::prelude::*;
//! use ndarray::{arr2, Array1};
//!
//! // 10 x 10 grid with a missing column of observations
//! let grid = RegularGrid::new(&arr2(&[[0., 50.], [0., 50.]]), &[10, 10]);
//! let (xn, _) = normalize_locations(&grid.locations());
//! let z = Array1::from_shape_fn(100, |i| if i % 10 == 5 { f64::NAN } else { (i / 10) as f64 });
//! let (zc, mean) = center_observations(&z);
//!
//! let tree = MraTree::params(ExponentialCov::new(1., 0.3))
//!     .n_levels(2)
//!     .n_children(4)
//!     .n_knots(2)
//!     .fit(&Dataset::new(xn, zc))
//!     .expect("MRA tree built");
//! let (pred, std) = tree.predict().expect("tree is ready");
//!
//! assert_eq!(pred.len(), 100);
//! assert!(std.iter().all(|v| v.is_finite()));
//! assert_abs_diff_eq!(pred[0] + mean, 0., epsilon = 0.1);
//! ```

pub use mrabox_layout as layout;
pub use mrabox_mra as mra;

/// Commonly used types and traits
pub mod prelude {
    pub use linfa::prelude::{Dataset, Fit};
    pub use linfa::ParamGuard;
    pub use mrabox_layout::{
        center_observations, grid_shape, normalize_locations, LocationLayout, RandomLayout,
        RegularGrid,
    };
    pub use mrabox_mra::{
        CovarianceModel, ExponentialCov, Matern32Cov, Matern52Cov, MraError, MraParams, MraTree,
        SquaredExponentialCov,
    };
}
