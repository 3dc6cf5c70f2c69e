//! Dense linear algebra helpers used by the MRA passes.
//!
//! Every solve of the algorithm boils down to inverting a symmetric positive (semi-)definite
//! block. [`spd_inverse`] tries a plain Cholesky factorization first, then adds an increasing
//! diagonal jitter, and eventually falls back to an eigen decomposition based pseudo-inverse.
//! Each fallback is reported through the returned [`Stabilization`] value.

use crate::errors::{MraError, Result};
use linfa::Float;
use linfa_linalg::{cholesky::*, eigh::*, triangular::*};
use log::warn;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of jitter magnitudes tried before the pseudo-inverse fallback
const N_JITTER_TRIALS: i32 = 10;

/// How the inverse of a covariance block was obtained
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Stabilization<F: Float> {
    /// Plain Cholesky factorization succeeded
    Exact,
    /// Cholesky factorization succeeded once the given value was added to the diagonal
    Jitter(F),
    /// Eigen decomposition based pseudo-inverse of the given numerical rank
    PseudoInverse {
        /// Number of eigenvalues kept
        rank: usize,
    },
}

impl<F: Float> Stabilization<F> {
    /// Whether a regularization had to be applied
    pub fn is_stabilized(&self) -> bool {
        !matches!(self, Stabilization::Exact)
    }
}

impl<F: Float> fmt::Display for Stabilization<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stabilization::Exact => write!(f, "exact"),
            Stabilization::Jitter(j) => write!(f, "jitter({:e})", j),
            Stabilization::PseudoInverse { rank } => write!(f, "pseudo-inverse(rank={})", rank),
        }
    }
}

/// Returns (a + a^T) / 2
pub fn symmetrize<F: Float>(a: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
    let half = F::cast(0.5);
    let mut s = a.to_owned();
    Zip::from(&mut s)
        .and(&a.t())
        .for_each(|v, &vt| *v = (*v + vt) * half);
    s
}

/// Computes diag(h s h^T) without forming the (n, n) product
pub fn diag_quadratic<F: Float>(
    h: &ArrayBase<impl Data<Elem = F>, Ix2>,
    s: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array1<F> {
    (h.dot(s) * h).sum_axis(Axis(1))
}

fn all_finite<F: Float>(a: &Array2<F>) -> bool {
    a.iter().all(|v| v.is_finite())
}

/// Inverse from Cholesky factorization: a = L L^T then a^-1 = L^-T L^-1
///
/// Factorizations with a pivot `L_ii^2` below `n * eps * max(diag(a))` are rejected
/// as numerically singular.
fn cholesky_inverse<F: Float>(a: &Array2<F>) -> Option<Array2<F>> {
    let l = a.cholesky().ok()?;
    if !all_finite(&l) {
        return None;
    }
    let dmax = a.diag().iter().fold(F::zero(), |acc, v| acc.max(v.abs()));
    let tol = F::cast(a.nrows()) * F::epsilon() * dmax;
    if l.diag().iter().any(|v| *v * *v <= tol) {
        return None;
    }
    let li = l
        .solve_triangular(&Array2::eye(l.nrows()), UPLO::Lower)
        .ok()?;
    let inv = symmetrize(&li.t().dot(&li));
    if all_finite(&inv) {
        Some(inv)
    } else {
        None
    }
}

fn pseudo_inverse<F: Float>(a: Array2<F>) -> Result<(Array2<F>, usize)> {
    let n = a.nrows();
    let (eigvals, eigvecs) = a.eigh_into()?;
    let lmax = eigvals.iter().fold(F::zero(), |acc, v| acc.max(v.abs()));
    let tol = F::cast(n) * F::epsilon() * lmax;
    let inv_vals = eigvals.mapv(|v| if v > tol { F::one() / v } else { F::zero() });
    let rank = inv_vals.iter().filter(|v| **v > F::zero()).count();
    let scaled = &eigvecs * &inv_vals.insert_axis(Axis(0));
    Ok((symmetrize(&scaled.dot(&eigvecs.t())), rank))
}

/// Inverse of a symmetric positive semi-definite matrix.
///
/// The input is symmetrized first. When Cholesky factorization fails, a jitter
/// `max(nugget, eps) * scale * 10^k` (k = 0..10, scale being the mean absolute diagonal value)
/// is added to the diagonal. When every jitter fails, the eigen decomposition pseudo-inverse
/// is returned.
///
/// Fails with `ArithmeticFailure` when the input is not finite or when no finite inverse
/// can be computed.
pub fn spd_inverse<F: Float>(
    a: &ArrayBase<impl Data<Elem = F>, Ix2>,
    nugget: F,
) -> Result<(Array2<F>, Stabilization<F>)> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(MraError::ArithmeticFailure(format!(
            "Cannot invert a non square ({}, {}) matrix",
            n,
            a.ncols()
        )));
    }
    if n == 0 {
        return Ok((Array2::zeros((0, 0)), Stabilization::Exact));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(MraError::ArithmeticFailure(
            "Matrix to invert contains non finite values".to_string(),
        ));
    }

    let a = symmetrize(a);
    if let Some(inv) = cholesky_inverse(&a) {
        return Ok((inv, Stabilization::Exact));
    }

    let scale = a.diag().iter().fold(F::zero(), |acc, v| acc + v.abs()) / F::cast(n);
    let scale = if scale > F::zero() { scale } else { F::one() };
    let base = nugget.max(F::epsilon()) * scale;
    for k in 0..N_JITTER_TRIALS {
        let jitter = base * F::cast(10.).powi(k);
        let mut aj = a.clone();
        aj.diag_mut().mapv_inplace(|v| v + jitter);
        if let Some(inv) = cholesky_inverse(&aj) {
            warn!("Singular {n}x{n} block inverted with jitter {jitter:e}");
            return Ok((inv, Stabilization::Jitter(jitter)));
        }
    }

    let (inv, rank) = pseudo_inverse(a)?;
    if all_finite(&inv) {
        warn!("Singular {n}x{n} block inverted with pseudo-inverse of rank {rank}");
        Ok((inv, Stabilization::PseudoInverse { rank }))
    } else {
        Err(MraError::ArithmeticFailure(format!(
            "Unable to compute a finite inverse of a {n}x{n} block"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_spd_inverse_exact() {
        let a = array![[4., 2., 0.6], [2., 2., 0.5], [0.6, 0.5, 3.]];
        let (inv, stab) = spd_inverse(&a, 1e-12).unwrap();
        assert_eq!(stab, Stabilization::Exact);
        assert_abs_diff_eq!(a.dot(&inv), Array2::<f64>::eye(3), epsilon = 1e-10);
    }

    #[test]
    fn test_spd_inverse_empty() {
        let a = Array2::<f64>::zeros((0, 0));
        let (inv, stab) = spd_inverse(&a, 1e-12).unwrap();
        assert_eq!(inv.dim(), (0, 0));
        assert!(!stab.is_stabilized());
    }

    #[test]
    fn test_spd_inverse_singular() {
        // duplicated location gives two identical rows
        let a = array![[1., 1., 0.5], [1., 1., 0.5], [0.5, 0.5, 1.]];
        let (inv, stab) = spd_inverse(&a, 100. * f64::EPSILON).unwrap();
        assert!(stab.is_stabilized());
        assert!(inv.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(inv, inv.t(), epsilon = 1e-6 * inv[[0, 0]].abs().max(1.));
    }

    #[test]
    fn test_spd_inverse_zero_matrix() {
        let a = Array2::<f64>::zeros((2, 2));
        let (inv, stab) = spd_inverse(&a, 0.).unwrap();
        assert!(stab.is_stabilized());
        assert!(inv.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_spd_inverse_non_finite() {
        let a = array![[1., f64::NAN], [f64::NAN, 1.]];
        assert!(matches!(
            spd_inverse(&a, 1e-12),
            Err(MraError::ArithmeticFailure(_))
        ));
    }

    #[test]
    fn test_pseudo_inverse_rank() {
        let a = array![[1., 1.], [1., 1.]];
        let (inv, rank) = pseudo_inverse(a.clone()).unwrap();
        assert_eq!(rank, 1);
        // Moore-Penrose property: a inv a = a
        assert_abs_diff_eq!(a.dot(&inv).dot(&a), a, epsilon = 1e-10);
    }

    #[test]
    fn test_diag_quadratic() {
        let h = array![[1., 2.], [0., 1.], [3., -1.]];
        let s = array![[2., 0.5], [0.5, 1.]];
        let expected = h.dot(&s).dot(&h.t()).diag().to_owned();
        assert_abs_diff_eq!(diag_quadratic(&h, &s), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetrize() {
        let a = array![[1., 2.], [0., 1.]];
        assert_abs_diff_eq!(symmetrize(&a), array![[1., 1.], [1., 1.]], epsilon = 1e-15);
    }
}
