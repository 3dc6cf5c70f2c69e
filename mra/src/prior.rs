//! Top-down prior pass.
//!
//! For a node `n` at level `m` with ancestors `a_0, ..., a_{m-1}` (and `a_m = n`), the cross
//! covariance blocks conditional on the coarser levels are computed recursively:
//!
//! `V^l_n = C(A_n, A_{a_l}) - sum_{k<l} T^k_n (V^k_{a_l})^T` for `l = 0..=m`
//!
//! with `T^k_n = V^k_n K_{a_k}` and `K_a` the inverse of the conditional prior `W_a = V^l_a` of the
//! ancestor. Only these small blocks are stored, the full joint covariance is never formed.

use crate::covariance_models::CovarianceModel;
use crate::errors::{MraError, Result};
use crate::linalg::{spd_inverse, symmetrize, Stabilization};
use crate::tree::{level_range, MraNode};
use linfa::Float;
use log::debug;
use ndarray::{s, Array2, ArrayBase, ArrayView2, Axis, Data, Ix2};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Prior quantities of one node
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct NodePrior<F: Float> {
    /// Conditional cross covariances `V^k_n` with the latent sets of the ancestors and itself
    cross: Vec<Array2<F>>,
    /// Basis functions `[T^0_n, ..., T^{m-1}_n]` evaluated at the node latent locations (q, p)
    pub(crate) basis: Array2<F>,
    /// Inverse of the conditional prior covariance `W_n`
    pub(crate) precision: Array2<F>,
    /// How `W_n` was inverted
    pub(crate) stabilization: Stabilization<F>,
}

impl<F: Float> NodePrior<F> {
    /// Conditional prior covariance `W_n` of the node latent variables
    pub(crate) fn covariance(&self) -> &Array2<F> {
        // last cross block is the one with itself
        &self.cross[self.cross.len() - 1]
    }
}

/// Evaluates the covariance model and checks the block shape
pub(crate) fn checked_cov<F: Float, Cov: CovarianceModel<F>>(
    cov: &Cov,
    a: ArrayView2<F>,
    b: ArrayView2<F>,
) -> Result<Array2<F>> {
    let k = cov.evaluate(a, b);
    if k.dim() != (a.nrows(), b.nrows()) {
        return Err(MraError::ConfigurationError(format!(
            "Covariance model {} returned a {:?} block, expected ({}, {})",
            cov,
            k.dim(),
            a.nrows(),
            b.nrows()
        )));
    }
    Ok(k)
}

/// Ids of the ancestors of `id` from the root, followed by `id` itself
pub(crate) fn path<F: Float>(nodes: &[MraNode<F>], id: usize) -> Vec<usize> {
    let mut path = vec![id];
    let mut current = id;
    while let Some(parent) = nodes[current].parent() {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}

fn node_prior<F: Float, Cov: CovarianceModel<F>>(
    cov: &Cov,
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    nodes: &[MraNode<F>],
    priors: &[NodePrior<F>],
    id: usize,
    nugget: F,
) -> Result<NodePrior<F>> {
    let path = path(nodes, id);
    let m = path.len() - 1;
    let xn = x.select(Axis(0), &nodes[id].basis());
    let q = xn.nrows();

    let mut cross: Vec<Array2<F>> = Vec::with_capacity(m + 1);
    let mut transfers: Vec<Array2<F>> = Vec::with_capacity(m);
    for (l, &anc) in path.iter().enumerate() {
        let xa = if l == m {
            xn.clone()
        } else {
            x.select(Axis(0), &nodes[anc].basis())
        };
        let mut v = checked_cov(cov, xn.view(), xa.view())?;
        for (k, t) in transfers.iter().enumerate() {
            // V^k of the ancestor at level l, or the block being built when l == m
            let vk = if l == m { &cross[k] } else { &priors[anc].cross[k] };
            v -= &t.dot(&vk.t());
        }
        if l < m {
            transfers.push(v.dot(&priors[anc].precision));
        }
        cross.push(v);
    }

    let w = symmetrize(&cross[m]);
    let (precision, stabilization) = spd_inverse(&w, nugget)?;
    cross[m] = w;

    let p: usize = transfers.iter().map(|t| t.ncols()).sum();
    let mut basis = Array2::zeros((q, p));
    let mut offset = 0;
    for t in transfers.iter() {
        basis
            .slice_mut(s![.., offset..offset + t.ncols()])
            .assign(t);
        offset += t.ncols();
    }

    Ok(NodePrior {
        cross,
        basis,
        precision,
        stabilization,
    })
}

/// Computes the prior of every node, level by level from the root.
///
/// Nodes of a level only depend on the previous levels and are processed in parallel.
pub(crate) fn compute_priors<F: Float, Cov: CovarianceModel<F>>(
    cov: &Cov,
    x: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
    nodes: &[MraNode<F>],
    n_children: usize,
    leaf_level: usize,
    nugget: F,
) -> Result<Vec<NodePrior<F>>> {
    let mut priors: Vec<NodePrior<F>> = Vec::with_capacity(nodes.len());
    for level in 0..=leaf_level {
        let ids = level_range(n_children, level);
        let level_priors = ids
            .into_par_iter()
            .map(|id| node_prior(cov, x, nodes, &priors, id, nugget))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Prior level {}: {} nodes, {} stabilized",
            level,
            level_priors.len(),
            level_priors
                .iter()
                .filter(|p| p.stabilization.is_stabilized())
                .count()
        );
        priors.extend(level_priors);
    }
    Ok(priors)
}
