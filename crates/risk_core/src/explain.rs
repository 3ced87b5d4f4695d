//! Exact per-feature attribution for tree ensembles (path-dependent TreeSHAP)
//!
//! Attributions are in margin (log-odds) space:
//! `baseline + sum(contributions) == ensemble.margin(row)` up to rounding.
//! The baseline is the cover-weighted expected margin and is computed once
//! per explainer; each call to [`TreeExplainer::explain`] is request scoped.

use crate::backend::BackendKind;
use crate::gbdt::{Ensemble, Tree};
use crate::schema::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Relative tolerance for `cover(left) + cover(right) == cover(parent)`
const COVER_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    #[error("the {0} backend does not provide attributions")]
    Unsupported(BackendKind),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("tree {tree} node {node}: {detail}")]
    InconsistentCover {
        tree: usize,
        node: usize,
        detail: String,
    },

    #[error("row has {actual} values, explainer expects {expected}")]
    RowWidth { expected: usize, actual: usize },

    #[error("vector columns do not match model features")]
    FeatureMismatch,

    #[error("attribution produced a non-finite value")]
    NonFinite,
}

/// Per-feature decomposition of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    /// Expected margin over the training distribution
    pub baseline: f64,

    /// One entry per schema field, in schema order
    pub contributions: Vec<f64>,
}

impl Attribution {
    /// `baseline + sum(contributions)`; equals the row's margin
    pub fn total(&self) -> f64 {
        self.baseline + self.contributions.iter().sum::<f64>()
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Attribution engine bound to one ensemble
#[derive(Debug, Clone)]
pub struct TreeExplainer {
    ensemble: Arc<Ensemble>,
    baseline: f64,
}

impl TreeExplainer {
    /// Validate structure and covers, then precompute the baseline
    pub fn new(ensemble: Arc<Ensemble>) -> Result<Self, ExplainError> {
        ensemble
            .validate()
            .map_err(|e| ExplainError::InvalidModel(e.to_string()))?;
        for (t, tree) in ensemble.trees.iter().enumerate() {
            check_covers(t, tree)?;
        }

        let baseline = ensemble.trees.iter().fold(ensemble.base_margin, |acc, tree| {
            acc + tree.weight * expected_value(tree, 0)
        });
        if !baseline.is_finite() {
            return Err(ExplainError::NonFinite);
        }

        Ok(Self { ensemble, baseline })
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Attribution for a reconciled vector
    pub fn explain(&self, vector: &FeatureVector) -> Result<Attribution, ExplainError> {
        if !vector.schema().matches(&self.ensemble.feature_names) {
            return Err(ExplainError::FeatureMismatch);
        }
        self.explain_row(vector.values())
    }

    /// Attribution for a positional row
    pub fn explain_row(&self, row: &[f64]) -> Result<Attribution, ExplainError> {
        let expected = self.ensemble.num_features();
        if row.len() != expected {
            return Err(ExplainError::RowWidth {
                expected,
                actual: row.len(),
            });
        }

        let mut phi = vec![0.0; expected];
        for tree in &self.ensemble.trees {
            if tree.nodes.is_empty() {
                continue;
            }
            recurse(tree, row, &mut phi, 0, &[], 1.0, 1.0, None);
        }

        if phi.iter().any(|v| !v.is_finite()) {
            return Err(ExplainError::NonFinite);
        }

        Ok(Attribution {
            baseline: self.baseline,
            contributions: phi,
        })
    }
}

fn check_covers(t: usize, tree: &Tree) -> Result<(), ExplainError> {
    for (i, node) in tree.nodes.iter().enumerate() {
        if node.is_leaf() {
            continue;
        }
        if node.cover <= 0.0 {
            return Err(ExplainError::InconsistentCover {
                tree: t,
                node: i,
                detail: format!("split node has cover {}", node.cover),
            });
        }
        let children = tree.nodes[node.left as usize].cover + tree.nodes[node.right as usize].cover;
        if (children - node.cover).abs() > COVER_TOLERANCE * node.cover.max(1.0) {
            return Err(ExplainError::InconsistentCover {
                tree: t,
                node: i,
                detail: format!("children cover {children} != node cover {}", node.cover),
            });
        }
    }
    Ok(())
}

/// Cover-weighted mean leaf value below `idx`
fn expected_value(tree: &Tree, idx: usize) -> f64 {
    let node = &tree.nodes[idx];
    if node.is_leaf() {
        return node.leaf_value().unwrap_or(0.0);
    }
    let (l, r) = (node.left as usize, node.right as usize);
    (tree.nodes[l].cover * expected_value(tree, l) + tree.nodes[r].cover * expected_value(tree, r))
        / node.cover
}

fn extend_path(
    path: &mut Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / (depth + 1) as f64;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / (depth + 1) as f64;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else {
            path[i].pweight =
                path[i].pweight * (depth + 1) as f64 / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of `path` with element `path_index` removed
fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (depth + 1) as f64 / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (depth - i) as f64 / (depth + 1) as f64;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((depth - i) as f64 / (depth + 1) as f64);
        }
    }
    total
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    row: &[f64],
    phi: &mut [f64],
    idx: usize,
    parent_path: &[PathElement],
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: Option<usize>,
) {
    let mut path = parent_path.to_vec();
    extend_path(&mut path, parent_zero_fraction, parent_one_fraction, parent_feature);

    let node = &tree.nodes[idx];
    if node.is_leaf() {
        let leaf = tree.weight * node.leaf_value().unwrap_or(0.0);
        for i in 1..path.len() {
            let w = unwound_path_sum(&path, i);
            let el = path[i];
            if let Some(feature) = el.feature {
                phi[feature] += w * (el.one_fraction - el.zero_fraction) * leaf;
            }
        }
        return;
    }

    let split = node.feature_idx as usize;
    let hot = node.next(row[split]);
    let cold = if hot == node.left as usize {
        node.right as usize
    } else {
        node.left as usize
    };
    let hot_zero_fraction = tree.nodes[hot].cover / node.cover;
    let cold_zero_fraction = tree.nodes[cold].cover / node.cover;

    // A feature seen higher up the path is merged rather than counted twice
    let mut incoming_zero_fraction = 1.0;
    let mut incoming_one_fraction = 1.0;
    if let Some(k) = path.iter().position(|el| el.feature == Some(split)) {
        incoming_zero_fraction = path[k].zero_fraction;
        incoming_one_fraction = path[k].one_fraction;
        unwind_path(&mut path, k);
    }

    recurse(
        tree,
        row,
        phi,
        hot,
        &path,
        hot_zero_fraction * incoming_zero_fraction,
        incoming_one_fraction,
        Some(split),
    );
    recurse(
        tree,
        row,
        phi,
        cold,
        &path,
        cold_zero_fraction * incoming_zero_fraction,
        0.0,
        Some(split),
    );
}
