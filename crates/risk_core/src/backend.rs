//! Inference backends behind a single default-probability contract
//!
//! Two backends wrap the same [`Ensemble`]:
//! - [`TreeClassifier`] mirrors a probability-calibrated classifier with a
//!   `predict_proba` call returning one probability per class.
//! - [`Booster`] mirrors a raw booster that predicts over a [`DMatrix`] whose
//!   columns are named.
//!
//! Which one serves requests is fixed when the model is loaded.

use crate::gbdt::{Ensemble, ModelError};
use crate::schema::FeatureVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Index of the "default" class in a two-class probability row
pub const DEFAULT_CLASS: usize = 1;

/// Failures of a single backend call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("row has {actual} values, model expects {expected}")]
    RowWidth { expected: usize, actual: usize },

    #[error("input columns {actual:?} do not match booster features {expected:?}")]
    FeatureNames {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("malformed backend output: {0}")]
    MalformedOutput(String),

    #[error("backend returned {0}, which is not a probability")]
    OutOfRange(f64),
}

/// Selectable backend variants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Classifier,
    Booster,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Classifier => "classifier",
            BackendKind::Booster => "booster",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classifier" | "proba" => Ok(BackendKind::Classifier),
            "booster" => Ok(BackendKind::Booster),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

/// Two-class probability classifier over positional rows
#[derive(Debug, Clone)]
pub struct TreeClassifier {
    ensemble: Arc<Ensemble>,
}

impl TreeClassifier {
    pub fn new(ensemble: Arc<Ensemble>) -> Result<Self, ModelError> {
        ensemble.validate()?;
        if !ensemble.objective.emits_probability() {
            return Err(ModelError::UnsupportedObjective(ensemble.objective));
        }
        Ok(Self { ensemble })
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    pub fn shared_ensemble(&self) -> Arc<Ensemble> {
        Arc::clone(&self.ensemble)
    }

    /// Class probabilities `[P(no default), P(default)]` for each row
    pub fn predict_proba(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>, InferenceError> {
        let expected = self.ensemble.num_features();
        rows.iter()
            .map(|row| {
                if row.len() != expected {
                    return Err(InferenceError::RowWidth {
                        expected,
                        actual: row.len(),
                    });
                }
                let p = self.ensemble.predict(row);
                Ok(vec![1.0 - p, p])
            })
            .collect()
    }
}

/// Dense row-major matrix with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct DMatrix {
    feature_names: Vec<String>,
    data: Vec<f64>,
    num_rows: usize,
}

impl DMatrix {
    /// Wrap a single row
    pub fn from_row(values: &[f64], feature_names: &[String]) -> Result<Self, InferenceError> {
        if values.len() != feature_names.len() {
            return Err(InferenceError::RowWidth {
                expected: feature_names.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            feature_names: feature_names.to_vec(),
            data: values.to_vec(),
            num_rows: 1,
        })
    }

    /// Wrap a reconciled feature vector, naming columns from its schema
    pub fn from_vector(vector: &FeatureVector) -> Self {
        Self {
            feature_names: vector.schema().names().to_vec(),
            data: vector.values().to_vec(),
            num_rows: 1,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.feature_names.len()
    }

    pub fn row(&self, idx: usize) -> Option<&[f64]> {
        let width = self.num_cols();
        (idx < self.num_rows).then(|| &self.data[idx * width..(idx + 1) * width])
    }
}

/// Raw booster interface over named matrices
#[derive(Debug, Clone)]
pub struct Booster {
    ensemble: Arc<Ensemble>,
}

impl Booster {
    pub fn new(ensemble: Arc<Ensemble>) -> Result<Self, ModelError> {
        ensemble.validate()?;
        Ok(Self { ensemble })
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// One output per row: the margin when `output_margin`, otherwise the
    /// objective-transformed prediction
    pub fn predict(&self, data: &DMatrix, output_margin: bool) -> Result<Vec<f64>, InferenceError> {
        if data.feature_names() != self.ensemble.feature_names.as_slice() {
            return Err(InferenceError::FeatureNames {
                expected: self.ensemble.feature_names.clone(),
                actual: data.feature_names().to_vec(),
            });
        }

        Ok((0..data.num_rows())
            .filter_map(|i| data.row(i))
            .map(|row| {
                if output_margin {
                    self.ensemble.margin(row)
                } else {
                    self.ensemble.predict(row)
                }
            })
            .collect())
    }
}

/// The configured inference backend
#[derive(Debug, Clone)]
pub enum InferenceBackend {
    Classifier(TreeClassifier),
    Booster(Booster),
}

impl InferenceBackend {
    /// Wrap `ensemble` in the selected backend
    ///
    /// Both variants require an objective that already emits probabilities;
    /// no sigmoid is applied on top of backend output.
    pub fn from_ensemble(kind: BackendKind, ensemble: Ensemble) -> Result<Self, ModelError> {
        let ensemble = Arc::new(ensemble);
        match kind {
            BackendKind::Classifier => Ok(Self::Classifier(TreeClassifier::new(ensemble)?)),
            BackendKind::Booster => {
                if !ensemble.objective.emits_probability() {
                    return Err(ModelError::UnsupportedObjective(ensemble.objective));
                }
                Ok(Self::Booster(Booster::new(ensemble)?))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Classifier(_) => BackendKind::Classifier,
            Self::Booster(_) => BackendKind::Booster,
        }
    }

    pub fn ensemble(&self) -> &Ensemble {
        match self {
            Self::Classifier(c) => c.ensemble(),
            Self::Booster(b) => b.ensemble(),
        }
    }

    /// Only the classifier path offers attributions
    pub fn supports_explanation(&self) -> bool {
        matches!(self, Self::Classifier(_))
    }

    /// P(default) for one reconciled row
    pub fn predict_default_probability(&self, vector: &FeatureVector) -> Result<f64, InferenceError> {
        let p = match self {
            Self::Classifier(classifier) => {
                let expected = &classifier.ensemble().feature_names;
                if !vector.schema().matches(expected) {
                    return Err(InferenceError::FeatureNames {
                        expected: expected.clone(),
                        actual: vector.schema().names().to_vec(),
                    });
                }
                let proba = classifier.predict_proba(&[vector.values()])?;
                let row = proba.first().ok_or_else(|| {
                    InferenceError::MalformedOutput("no rows returned".to_string())
                })?;
                if row.len() != 2 {
                    return Err(InferenceError::MalformedOutput(format!(
                        "expected 2 class probabilities, got {}",
                        row.len()
                    )));
                }
                row[DEFAULT_CLASS]
            }
            Self::Booster(booster) => {
                let matrix = DMatrix::from_vector(vector);
                let out = booster.predict(&matrix, false)?;
                match out.as_slice() {
                    [p] => *p,
                    other => {
                        return Err(InferenceError::MalformedOutput(format!(
                            "expected 1 prediction, got {}",
                            other.len()
                        )))
                    }
                }
            }
        };

        if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
            return Err(InferenceError::OutOfRange(p));
        }
        Ok(p)
    }
}
