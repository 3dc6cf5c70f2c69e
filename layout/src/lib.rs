//! This library provides spatial location layouts and the preprocessing conventions used
//! before building a multi-resolution approximation of a spatial gaussian process.
//!
//! Location layouts implement the [LocationLayout] trait:
//! * [RegularGrid]: nodes of a regular grid, row-major ordered,
//! * [RandomLayout]: irregular locations drawn uniformly in the domain.
//!
//! Preprocessing helpers:
//! * [normalize_locations]: map coordinates into the unit hypercube,
//! * [grid_shape]: infer the shape of gridded data from unique coordinate values,
//! * [center_observations]: center observations on the mean of the non missing values.
//!
//! ```
//! use mrabox_layout::{center_observations, grid_shape, normalize_locations, LocationLayout, RegularGrid};
//! use ndarray::{arr2, Array1};
//!
//! let locations = RegularGrid::new(&arr2(&[[0.0, 10.0], [-5.0, 5.0]]), &[4, 3]).locations();
//! let (xn, _scaling) = normalize_locations(&locations);
//! assert_eq!(grid_shape(&xn), vec![4, 3]);
//!
//! let z = Array1::from_vec(vec![1., f64::NAN, 3.]);
//! let (zc, mean) = center_observations(&z);
//! assert_eq!(mean, 2.);
//! ```
#![warn(missing_docs)]

mod normalization;
mod random;
mod regular_grid;
mod traits;

pub use normalization::*;
pub use random::*;
pub use regular_grid::*;
pub use traits::*;
