//! A module for covariance models of the spatial process.
//!
//! The MRA algorithm only needs to evaluate dense covariance blocks between two location sets,
//! so any kernel can be plugged in through the [`CovarianceModel`] trait. The following
//! isotropic models, parameterized by a variance `sigma2` and a `range` (length scale), are provided:
//! * exponential,
//! * squared exponential,
//! * matern 3/2,
//! * matern 5/2.
//!
//! Arbitrary closures can also be used thanks to the [`CovarianceFn`] adapter.

use crate::utils::pairwise_distances;
use linfa::Float;
use ndarray::{Array2, ArrayView2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A trait for covariance functions used by the MRA tree.
///
/// Implementations have to be pure: the same location sets always give the same matrix.
pub trait CovarianceModel<F: Float>: Clone + fmt::Display + Sync {
    /// Compute the (na, nb) covariance matrix between locations `a` (na, d) and `b` (nb, d)
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F>;
}

fn isotropic<F: Float>(a: ArrayView2<F>, b: ArrayView2<F>, profile: impl Fn(F) -> F) -> Array2<F> {
    pairwise_distances(&a, &b).mapv(profile)
}

/// Exponential covariance model
///
/// `sigma2 * exp(-d / range)`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ExponentialCov<F: Float> {
    sigma2: F,
    range: F,
}

/// Squared exponential covariance model
///
/// `sigma2 * exp(-d^2 / (2 * range^2))`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct SquaredExponentialCov<F: Float> {
    sigma2: F,
    range: F,
}

/// Matern 3/2 covariance model
///
/// `sigma2 * (1 + sqrt(3) * d / range) * exp(-sqrt(3) * d / range)`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Matern32Cov<F: Float> {
    sigma2: F,
    range: F,
}

/// Matern 5/2 covariance model
///
/// `sigma2 * (1 + sqrt(5) * d / range + 5 * d^2 / (3 * range^2)) * exp(-sqrt(5) * d / range)`
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Matern52Cov<F: Float> {
    sigma2: F,
    range: F,
}

macro_rules! isotropic_model {
    ($model:ident, $name:expr) => {
        impl<F: Float> $model<F> {
            /// Constructor given the process variance and the range
            pub fn new(sigma2: F, range: F) -> Self {
                Self { sigma2, range }
            }

            /// Process variance
            pub fn sigma2(&self) -> F {
                self.sigma2
            }

            /// Range (length scale)
            pub fn range(&self) -> F {
                self.range
            }
        }

        impl<F: Float> Default for $model<F> {
            fn default() -> Self {
                Self::new(F::one(), F::one())
            }
        }

        impl<F: Float> fmt::Display for $model<F> {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}(sigma2={}, range={})", $name, self.sigma2, self.range)
            }
        }
    };
}

isotropic_model!(ExponentialCov, "Exponential");
isotropic_model!(SquaredExponentialCov, "SquaredExponential");
isotropic_model!(Matern32Cov, "Matern32");
isotropic_model!(Matern52Cov, "Matern52");

impl<F: Float> CovarianceModel<F> for ExponentialCov<F> {
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        isotropic(a, b, |d| self.sigma2 * F::exp(-d / self.range))
    }
}

impl<F: Float> CovarianceModel<F> for SquaredExponentialCov<F> {
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        let two_r2 = F::cast(2.) * self.range * self.range;
        isotropic(a, b, |d| self.sigma2 * F::exp(-d * d / two_r2))
    }
}

impl<F: Float> CovarianceModel<F> for Matern32Cov<F> {
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        let sqrt3 = F::cast(3.).sqrt();
        isotropic(a, b, |d| {
            let h = sqrt3 * d / self.range;
            self.sigma2 * (F::one() + h) * F::exp(-h)
        })
    }
}

impl<F: Float> CovarianceModel<F> for Matern52Cov<F> {
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        let sqrt5 = F::cast(5.).sqrt();
        isotropic(a, b, |d| {
            let h = sqrt5 * d / self.range;
            self.sigma2 * (F::one() + h + h * h / F::cast(3.)) * F::exp(-h)
        })
    }
}

/// Adapter to use a closure `(a, b) -> cov(a, b)` as a [`CovarianceModel`]
///
/// ```
/// use mrabox_mra::covariance_models::{CovarianceFn, CovarianceModel};
/// use ndarray::{array, Array2, ArrayView2};
///
/// let white = CovarianceFn::new(|a: ArrayView2<f64>, b: ArrayView2<f64>| {
///     Array2::from_shape_fn((a.nrows(), b.nrows()), |(i, j)| if a.row(i) == b.row(j) { 1. } else { 0. })
/// });
/// let x = array![[0., 0.], [1., 0.]];
/// assert_eq!(white.evaluate(x.view(), x.view()), Array2::eye(2));
/// ```
pub struct CovarianceFn<F, C> {
    cov: C,
    phantom: PhantomData<F>,
}

impl<F: Float, C> CovarianceFn<F, C>
where
    C: Fn(ArrayView2<F>, ArrayView2<F>) -> Array2<F> + Clone + Sync,
{
    /// Wrap given covariance function
    pub fn new(cov: C) -> Self {
        CovarianceFn {
            cov,
            phantom: PhantomData,
        }
    }
}

impl<F: Float, C: Clone> Clone for CovarianceFn<F, C> {
    fn clone(&self) -> Self {
        CovarianceFn {
            cov: self.cov.clone(),
            phantom: PhantomData,
        }
    }
}

impl<F, C> fmt::Display for CovarianceFn<F, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CovarianceFn")
    }
}

impl<F: Float, C> CovarianceModel<F> for CovarianceFn<F, C>
where
    C: Fn(ArrayView2<F>, ArrayView2<F>) -> Array2<F> + Clone + Sync,
{
    fn evaluate(&self, a: ArrayView2<F>, b: ArrayView2<F>) -> Array2<F> {
        (self.cov)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};
    use paste::paste;

    macro_rules! test_cov {
        ($model:ident, $expected:expr) => {
            paste! {
                #[test]
                fn [<test_ $model:snake _values>]() {
                    let cov = [<$model Cov>]::new(2., 0.5);
                    let x = array![[0., 0.], [0.3, 0.4], [1., 1.]];
                    let k = cov.evaluate(x.view(), x.view());

                    assert_abs_diff_eq!(k.diag().to_owned(), Array1::from_elem(3, 2.), epsilon = 1e-12);
                    assert_abs_diff_eq!(k, k.t(), epsilon = 1e-12);
                    // d(x0, x1) = 0.5, i.e. one range
                    assert_abs_diff_eq!(k[[0, 1]], $expected, epsilon = 1e-6);
                    assert!(k[[0, 2]] < k[[0, 1]]);
                    assert!(k[[0, 2]] > 0.);
                }
            }
        };
    }

    test_cov!(Exponential, 2. * f64::exp(-1.));
    test_cov!(SquaredExponential, 2. * f64::exp(-0.5));
    test_cov!(Matern32, 2. * (1. + f64::sqrt(3.)) * f64::exp(-f64::sqrt(3.)));
    test_cov!(Matern52, 2. * (1. + f64::sqrt(5.) + 5. / 3.) * f64::exp(-f64::sqrt(5.)));

    #[test]
    fn test_cross_covariance_shape() {
        let cov = ExponentialCov::new(1., 0.3);
        let a = array![[0., 0.], [0., 1.], [1., 0.]];
        let b = array![[1., 1.]];
        let k = cov.evaluate(a.view(), b.view());
        assert_eq!(k.dim(), (3, 1));
        assert_abs_diff_eq!(k[[0, 0]], f64::exp(-f64::sqrt(2.) / 0.3), epsilon = 1e-12);
    }

    #[test]
    fn test_covariance_fn() {
        let exp = ExponentialCov::new(1., 0.3);
        let cov = CovarianceFn::new(move |a: ArrayView2<f64>, b: ArrayView2<f64>| exp.evaluate(a, b));
        let x = array![[0., 0.], [0.5, 0.5]];
        assert_eq!(cov.evaluate(x.view(), x.view()), exp.evaluate(x.view(), x.view()));
        assert_eq!(cov.to_string(), "CovarianceFn");
    }

    #[test]
    fn test_display() {
        let cov = ExponentialCov::new(1., 0.3);
        assert_eq!(cov.to_string(), "Exponential(sigma2=1, range=0.3)");
    }
}
