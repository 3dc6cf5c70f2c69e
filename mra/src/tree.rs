//! Node arena of the MRA tree and construction of its spatial skeleton.
//!
//! The tree is regular: level `l` holds `J^l` nodes, stored in level order so that
//! the node at position `p` of level `l` has id `offset(l) + p`, its parent is at position
//! `p / J` of level `l - 1` and its children at positions `p * J .. (p + 1) * J` of level `l + 1`.

use crate::errors::Result;
use crate::knots::select_knots;
use crate::parameters::KnotSelection;
use crate::partition::{assign_points, split_counts, Region};
use linfa::Float;
use ndarray::{ArrayBase, Data, Ix2};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Total number of nodes of a regular tree with `n_children` children per node down to
/// `leaf_level`, `None` on overflow.
pub fn n_nodes(n_children: usize, leaf_level: usize) -> Option<usize> {
    let mut total: usize = 0;
    let mut width: usize = 1;
    for l in 0..=leaf_level {
        total = total.checked_add(width)?;
        if l < leaf_level {
            width = width.checked_mul(n_children)?;
        }
    }
    Some(total)
}

/// Range of node ids of `level`
pub(crate) fn level_range(n_children: usize, level: usize) -> Range<usize> {
    let start = if level == 0 {
        0
    } else {
        n_nodes(n_children, level - 1).unwrap_or(usize::MAX)
    };
    let width = n_children.pow(level as u32);
    start..start + width
}

/// A node of the MRA tree: one subregion at one resolution level
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(serialize = "F: Serialize", deserialize = "F: Deserialize<'de>"))
)]
pub struct MraNode<F: Float> {
    id: usize,
    level: usize,
    sibling: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    region: Region<F>,
    knots: Vec<usize>,
    residuals: Vec<usize>,
}

impl<F: Float> MraNode<F> {
    /// Node id, i.e. index in the arena
    pub fn id(&self) -> usize {
        self.id
    }

    /// Resolution level, 0 is the root
    pub fn level(&self) -> usize {
        self.level
    }

    /// Index among the siblings
    pub fn sibling(&self) -> usize {
        self.sibling
    }

    /// Parent id, `None` for the root
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Children ids, empty for a leaf
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// Bounding box
    pub fn region(&self) -> &Region<F> {
        &self.region
    }

    /// Location indices selected as knots
    pub fn knots(&self) -> &[usize] {
        &self.knots
    }

    /// Location indices resolved by the leaf besides its knots, empty for inner nodes
    pub fn residuals(&self) -> &[usize] {
        &self.residuals
    }

    /// Whether the node has no children
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Location indices of the node latent variables: knots then residuals
    pub fn basis(&self) -> Vec<usize> {
        self.knots
            .iter()
            .chain(self.residuals.iter())
            .copied()
            .collect()
    }
}

/// Builds the node arena: partitions the locations down to `leaf_level` and selects
/// the knots of every node among the points not claimed by its ancestors.
pub(crate) fn build_skeleton<F: Float>(
    x: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>,
    n_children: usize,
    leaf_level: usize,
    n_knots: usize,
    selection: KnotSelection,
) -> Result<Vec<MraNode<F>>> {
    let root = Region::from_locations(x)?;
    let mut nodes = Vec::with_capacity(n_nodes(n_children, leaf_level).unwrap_or(0));

    // (region, assigned point indices) of each node of the current level
    let mut current = vec![(root, (0..x.nrows()).collect::<Vec<_>>())];
    for level in 0..=leaf_level {
        let ids = level_range(n_children, level);
        let is_leaf = level == leaf_level;
        let counts = split_counts(n_children, x.ncols(), level);

        let built: Vec<_> = current
            .into_par_iter()
            .enumerate()
            .map(|(pos, (region, assigned))| {
                let id = ids.start + pos;
                let (knots, rest) = select_knots(&assigned, n_knots, selection, id);
                let parent = (level > 0)
                    .then(|| level_range(n_children, level - 1).start + pos / n_children);
                let (children, residuals, next) = if is_leaf {
                    (vec![], rest, vec![])
                } else {
                    let first = level_range(n_children, level + 1).start + pos * n_children;
                    let next: Vec<_> = region
                        .split(&counts)
                        .into_iter()
                        .zip(assign_points(&region, &counts, x, &rest))
                        .collect();
                    ((first..first + n_children).collect(), vec![], next)
                };
                let node = MraNode {
                    id,
                    level,
                    sibling: pos % n_children,
                    parent,
                    children,
                    region,
                    knots,
                    residuals,
                };
                (node, next)
            })
            .collect();

        current = Vec::with_capacity(built.len() * n_children);
        for (node, next) in built {
            nodes.push(node);
            current.extend(next);
        }
    }
    Ok(nodes)
}
