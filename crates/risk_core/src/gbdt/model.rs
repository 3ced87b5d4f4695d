//! Gradient-boosted tree ensemble
//!
//! The ensemble margin is `base_margin + sum(tree.weight * leaf)`; the
//! configured [`Objective`] decides whether `predict` returns that margin or
//! its logistic transform.

use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Artifact-level errors: reading, decoding, validating models
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Bincode error: {0}")]
    BincodeError(#[from] bincode::Error),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),

    #[error("Invalid model format: {0}")]
    InvalidFormat(String),

    #[error("Model hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Model features {actual:?} do not match schema {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Objective `{0}` does not emit probabilities")]
    UnsupportedObjective(Objective),
}

/// Current artifact format version
pub const MODEL_VERSION: i32 = 1;

/// Output transform applied to the ensemble margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Logistic loss; predictions are probabilities
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,

    /// Logistic loss; predictions are raw log-odds
    #[serde(rename = "binary:logitraw")]
    BinaryLogitRaw,
}

impl Objective {
    /// Whether `predict` yields a probability in [0, 1]
    pub fn emits_probability(self) -> bool {
        matches!(self, Objective::BinaryLogistic)
    }

    pub fn transform(self, margin: f64) -> f64 {
        match self {
            Objective::BinaryLogistic => sigmoid(margin),
            Objective::BinaryLogitRaw => margin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
        }
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numerically stable logistic function
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Tree ensemble with named, ordered input columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ensemble {
    /// Model format version
    pub version: i32,

    /// Column names in the order the model was fit on
    pub feature_names: Vec<String>,

    pub objective: Objective,

    /// Margin added before any tree contributes
    pub base_margin: f64,

    pub trees: Vec<Tree>,
}

impl Ensemble {
    pub fn new(
        feature_names: Vec<String>,
        objective: Objective,
        base_margin: f64,
        trees: Vec<Tree>,
    ) -> Self {
        Self {
            version: MODEL_VERSION,
            feature_names,
            objective,
            base_margin,
            trees,
        }
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.feature_names.is_empty() {
            return Err(ModelError::ValidationFailed(
                "Model declares no features".to_string(),
            ));
        }

        if !self.base_margin.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base_margin: {}",
                self.base_margin
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;

            if let Some(max_idx) = tree.max_feature_idx() {
                if max_idx >= self.num_features() {
                    return Err(ModelError::ValidationFailed(format!(
                        "Tree {i} splits on feature {max_idx} but model has {} features",
                        self.num_features()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Raw log-odds margin for one row
    pub fn margin(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_margin, |sum, tree| {
                sum + tree.weight * tree.evaluate(features)
            })
    }

    /// Margin passed through the objective transform
    pub fn predict(&self, features: &[f64]) -> f64 {
        self.objective.transform(self.margin(features))
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Blake3 hash of the canonical JSON form, as hex
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Ensemble = serde_json::from_slice(bytes)?;
        model.validate()?;
        Ok(model)
    }

    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let bytes = fs::read(path)?;
        Self::from_bincode_slice(&bytes)
    }

    pub fn from_bincode_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Ensemble = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }
}
