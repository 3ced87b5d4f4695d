//! Decision tree structures for GBDT inference
//!
//! Nodes are stored in a flat vector with node 0 as the root. Children always
//! sit at a higher index than their parent, which keeps traversal acyclic.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the feature row
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the leaf margin
///
/// `cover` is the (weighted) number of training rows that reached the node.
/// It is not used for prediction, only for attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold; rows with `x <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,

    /// Training cover reaching this node
    #[serde(default)]
    pub cover: f64,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(
        id: i32,
        feature_idx: i32,
        threshold: f64,
        left: i32,
        right: i32,
        cover: f64,
    ) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            cover,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64, cover: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            cover,
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }

    /// Child index taken by `value`
    pub fn next(&self, value: f64) -> usize {
        if value <= self.threshold {
            self.left as usize
        } else {
            self.right as usize
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A single regression tree contributing to the ensemble margin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to every leaf of this tree
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Index of the leaf reached by `features`
    ///
    /// Returns `None` for structurally invalid trees or rows that are too
    /// short for a split; validated trees with full rows always reach a leaf.
    pub fn leaf_index(&self, features: &[f64]) -> Option<usize> {
        let mut idx = 0usize;

        loop {
            let node = self.nodes.get(idx)?;
            if node.is_leaf() {
                return Some(idx);
            }

            let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = node.next(value);
            if next <= idx || next >= self.nodes.len() {
                return None;
            }
            idx = next;
        }
    }

    /// Evaluate this tree on a feature row (unweighted leaf value)
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        self.leaf_index(features)
            .and_then(|idx| self.nodes[idx].leaf_value())
            .unwrap_or(0.0)
    }

    /// Get the root node
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Largest feature index referenced by a split, if any
    pub fn max_feature_idx(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .filter_map(|n| usize::try_from(n.feature_idx).ok())
            .max()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                for (side, child) in [("left", node.left), ("right", node.right)] {
                    if child < 0 || child as usize >= self.nodes.len() {
                        return Err(format!("Node {i} has invalid {side} child: {child}"));
                    }
                    if child as usize <= i {
                        return Err(format!(
                            "Node {i} {side} child {child} does not follow its parent"
                        ));
                    }
                }

                if node.feature_idx < 0 {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }

                if !node.threshold.is_finite() {
                    return Err(format!("Node {i} has non-finite threshold"));
                }
            } else {
                match node.leaf {
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                    Some(v) if !v.is_finite() => {
                        return Err(format!("Leaf node {i} has non-finite value {v}"))
                    }
                    Some(_) => {}
                }
            }

            if !(node.cover.is_finite() && node.cover >= 0.0) {
                return Err(format!("Node {i} has invalid cover: {}", node.cover));
            }
        }

        Ok(())
    }
}
