//! Credit Default Risk Core
//!
//! Scores the probability that a credit-card customer defaults next month
//! from a handful of operator-supplied fields, using a gradient boosted tree
//! ensemble loaded once per process.
//!
//! Modules:
//! - `schema`: Feature schema, default table and feature vectors
//! - `reconcile`: Expansion of partial input into a full feature row
//! - `form`: The five operator-facing inputs and their domains
//! - `gbdt`: Float-valued tree ensemble and its artifact formats
//! - `backend`: Probability classifier and named-matrix booster backends
//! - `explain`: Exact per-feature attributions (TreeSHAP)
//! - `tier`: Risk tiers and thresholds
//! - `holder`: Lazy, write-once model cache
//! - `service`: The request pipeline
//! - `report`: Display payload for an assessment
//! - `config`: TOML configuration with environment overrides

pub mod backend;
pub mod config;
pub mod errors;
pub mod explain;
pub mod form;
pub mod gbdt;
pub mod holder;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod serde_canon;
pub mod service;
pub mod tier;

pub use backend::{BackendKind, Booster, DMatrix, InferenceBackend, InferenceError, TreeClassifier};
pub use config::RiskConfig;
pub use errors::{Result, RiskError};
pub use explain::{Attribution, ExplainError, TreeExplainer};
pub use form::{FormError, FormInput};
pub use gbdt::{Ensemble, ModelError, Objective};
pub use holder::{ArtifactFormat, ArtifactSource, LoadedModel, ModelHolder};
pub use reconcile::reconcile;
pub use report::{Explanation, ExplanationRow, Report};
pub use schema::{DefaultTable, FeatureSchema, FeatureVector, PartialInput, SchemaError};
pub use service::{Assessment, RiskService};
pub use tier::{PredictionResult, RiskThresholds, RiskTier, ThresholdError};

/// Crate version string for reports and logs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
