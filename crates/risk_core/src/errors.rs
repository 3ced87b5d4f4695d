//! Error types for the credit risk core

use crate::backend::InferenceError;
use crate::explain::ExplainError;
use crate::gbdt::ModelError;
use crate::schema::SchemaError;
use thiserror::Error;

/// Errors surfaced by the inference pipeline
///
/// Everything except [`RiskError::ArtifactLoad`] is scoped to a single
/// request and leaves the cached model untouched.
#[derive(Error, Debug)]
pub enum RiskError {
    /// Model artifact missing, corrupt, or incompatible with the schema
    #[error("Model artifact load failed: {0}")]
    ArtifactLoad(#[from] ModelError),

    /// A feature vector could not be reconciled
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Backend call failed or returned a malformed result
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    /// Attribution could not be computed
    #[error("Explanation failed: {0}")]
    Explanation(#[from] ExplainError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RiskError {
    /// Whether the process can keep serving predictions after this error
    pub fn is_request_scoped(&self) -> bool {
        !matches!(self, RiskError::ArtifactLoad(_) | RiskError::Config(_))
    }
}

/// Result type for credit risk operations
pub type Result<T> = std::result::Result<T, RiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_scoped_classification() {
        let schema = RiskError::from(SchemaError::MissingField("SEX".into()));
        assert!(schema.is_request_scoped());

        let load = RiskError::from(ModelError::InvalidFormat("truncated".into()));
        assert!(!load.is_request_scoped());

        let config = RiskError::Config("bad threshold".into());
        assert!(!config.is_request_scoped());
    }

    #[test]
    fn messages_carry_context() {
        let err = RiskError::from(SchemaError::UnknownField("FOO".into()));
        assert_eq!(
            err.to_string(),
            "Schema error: field `FOO` is not part of the feature schema"
        );
    }
}
