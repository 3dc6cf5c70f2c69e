//! Posterior passes over the tree, driven by the observed values.
//!
//! Node latent variables are stacked along the path from the root: a node at level `m` sees
//! `p` ancestor variables followed by its own `q` variables. Observations at the node locations
//! are `z_o = [B_o, I_o] [x_path; x_n] + e` with `B` the prior basis and `e ~ N(0, R)`.
//!
//! * Bottom-up: each node sums its children messages and its own observation terms into an
//!   information vector `omega` and matrix `lambda` over `(p + q)` variables, adds its prior
//!   precision to the `(q, q)` block, and marginalizes its own variables out to produce the
//!   `(p)` sized message of its parent.
//! * Top-down: the root posterior is read directly, then each node conditional
//!   `x_n | x_path ~ N(Kt (omega_q - lambda_qp x_path), Kt)` is combined with the posterior of its
//!   path, giving the joint posterior of the path and the point predictions of the node.

use crate::errors::Result;
use crate::linalg::{diag_quadratic, spd_inverse, symmetrize, Stabilization};
use crate::prior::NodePrior;
use crate::tree::{level_range, MraNode};
use linfa::Float;
use log::debug;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Quantities kept from the bottom-up pass for the top-down one
#[derive(Clone, Debug)]
struct NodeUpdate<F: Float> {
    /// Posterior covariance of the node variables given its path: (lambda_qq + K)^-1
    ktilde: Array2<F>,
    omega_q: Array1<F>,
    lambda_qp: Array2<F>,
    stabilization: Stabilization<F>,
}

/// Information form message sent to the parent
struct Message<F: Float> {
    omega: Array1<F>,
    lambda: Array2<F>,
}

/// Posterior predictions at the node latent locations
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct NodePosterior<F: Float> {
    pub(crate) mean: Array1<F>,
    pub(crate) variance: Array1<F>,
    pub(crate) stabilization: Stabilization<F>,
}

/// Joint posterior over the path variables of a node (ancestors then itself)
struct PathPosterior<F: Float> {
    mean: Array1<F>,
    cov: Array2<F>,
}

fn bottom_up_node<F: Float>(
    node: &MraNode<F>,
    prior: &NodePrior<F>,
    children: &[Message<F>],
    z: &Array1<F>,
    noise_variance: F,
    nugget: F,
) -> Result<(NodeUpdate<F>, Message<F>)> {
    let (q, p) = prior.basis.dim();
    let n = p + q;
    let mut omega = Array1::<F>::zeros(n);
    let mut lambda = Array2::<F>::zeros((n, n));
    for msg in children {
        omega += &msg.omega;
        lambda += &msg.lambda;
    }

    // observed rows of [B, I]
    let basis = node.basis();
    let observed: Vec<usize> = (0..q).filter(|&o| !z[basis[o]].is_nan()).collect();
    if !observed.is_empty() {
        let mut h = Array2::<F>::zeros((observed.len(), n));
        let mut zo = Array1::<F>::zeros(observed.len());
        for (r, &o) in observed.iter().enumerate() {
            h.slice_mut(s![r, ..p]).assign(&prior.basis.row(o));
            h[[r, p + o]] = F::one();
            zo[r] = z[basis[o]];
        }
        let inv_r = F::one() / noise_variance;
        omega.scaled_add(inv_r, &h.t().dot(&zo));
        lambda.scaled_add(inv_r, &h.t().dot(&h));
    }

    let mut lambda_qq = lambda.slice(s![p.., p..]).to_owned();
    lambda_qq += &prior.precision;
    let (ktilde, stabilization) = spd_inverse(&lambda_qq, nugget)?;

    let omega_q = omega.slice(s![p..]).to_owned();
    let lambda_qp = lambda.slice(s![p.., ..p]).to_owned();
    // Schur complement marginalizing the node variables out
    let g = ktilde.dot(&lambda_qp);
    let message = Message {
        omega: &omega.slice(s![..p]) - &lambda_qp.t().dot(&ktilde.dot(&omega_q)),
        lambda: symmetrize(&(&lambda.slice(s![..p, ..p]) - &lambda_qp.t().dot(&g))),
    };
    Ok((
        NodeUpdate {
            ktilde,
            omega_q,
            lambda_qp,
            stabilization,
        },
        message,
    ))
}

fn top_down_node<F: Float>(
    update: &NodeUpdate<F>,
    parent: Option<&PathPosterior<F>>,
) -> PathPosterior<F> {
    let mu_local = update.ktilde.dot(&update.omega_q);
    match parent {
        None => PathPosterior {
            mean: mu_local,
            cov: update.ktilde.clone(),
        },
        Some(pa) => {
            let g = update.ktilde.dot(&update.lambda_qp);
            let mu = mu_local - g.dot(&pa.mean);
            let cov_na = -g.dot(&pa.cov);
            let cov_nn = symmetrize(&(&update.ktilde - &cov_na.dot(&g.t())));

            let (p, q) = (pa.mean.len(), mu.len());
            let mut cov = Array2::zeros((p + q, p + q));
            cov.slice_mut(s![..p, ..p]).assign(&pa.cov);
            cov.slice_mut(s![p.., ..p]).assign(&cov_na);
            cov.slice_mut(s![..p, p..]).assign(&cov_na.t());
            cov.slice_mut(s![p.., p..]).assign(&cov_nn);
            PathPosterior {
                mean: concatenate![Axis(0), pa.mean, mu],
                cov,
            }
        }
    }
}

fn node_predictions<F: Float>(
    prior: &NodePrior<F>,
    update: &NodeUpdate<F>,
    path: &PathPosterior<F>,
) -> NodePosterior<F> {
    let q = prior.basis.nrows();
    let h = concatenate![Axis(1), prior.basis, Array2::<F>::eye(q)];
    NodePosterior {
        mean: h.dot(&path.mean),
        variance: diag_quadratic(&h, &path.cov).mapv(|v| v.max(F::zero())),
        stabilization: update.stabilization,
    }
}

/// Runs the bottom-up then top-down passes, returns the posterior of every node.
///
/// `z` holds one value per location, NaN values are missing observations.
pub(crate) fn compute_posterior<F: Float>(
    nodes: &[MraNode<F>],
    priors: &[NodePrior<F>],
    z: &Array1<F>,
    n_children: usize,
    leaf_level: usize,
    noise_variance: F,
    nugget: F,
) -> Result<Vec<NodePosterior<F>>> {
    // bottom-up
    let mut updates: Vec<Option<NodeUpdate<F>>> = vec![None; nodes.len()];
    let mut messages: Vec<Message<F>> = vec![];
    for level in (0..=leaf_level).rev() {
        let ids = level_range(n_children, level);
        let start = ids.start;
        let results = ids
            .into_par_iter()
            .map(|id| {
                let children = if level == leaf_level {
                    &messages[0..0]
                } else {
                    let pos = id - start;
                    &messages[pos * n_children..(pos + 1) * n_children]
                };
                bottom_up_node(&nodes[id], &priors[id], children, z, noise_variance, nugget)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("Posterior bottom-up level {}: {} nodes", level, results.len());

        messages = Vec::with_capacity(results.len());
        for (i, (update, message)) in results.into_iter().enumerate() {
            updates[start + i] = Some(update);
            messages.push(message);
        }
    }
    let updates: Vec<NodeUpdate<F>> = updates.into_iter().flatten().collect();

    // top-down
    let mut posteriors = Vec::with_capacity(nodes.len());
    let mut paths: Vec<PathPosterior<F>> = vec![];
    for level in 0..=leaf_level {
        let ids = level_range(n_children, level);
        let start = ids.start;
        let results: Vec<_> = ids
            .into_par_iter()
            .map(|id| {
                let parent = (level > 0).then(|| &paths[(id - start) / n_children]);
                let path = top_down_node(&updates[id], parent);
                let post = node_predictions(&priors[id], &updates[id], &path);
                (path, post)
            })
            .collect();
        debug!("Posterior top-down level {}: {} nodes", level, results.len());

        let (level_paths, level_posteriors): (Vec<_>, Vec<_>) = results.into_iter().unzip();
        paths = level_paths;
        posteriors.extend(level_posteriors);
    }
    Ok(posteriors)
}
