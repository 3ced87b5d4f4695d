//! Service configuration: TOML file, then environment overrides

use crate::backend::BackendKind;
use crate::errors::{Result, RiskError};
use crate::holder::{ArtifactFormat, ArtifactSource};
use crate::schema::{DefaultTable, FeatureSchema};
use crate::tier::RiskThresholds;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub model: ModelConfig,
    pub schema: SchemaConfig,
    /// Fallback value per schema field
    pub defaults: DefaultTable,
    pub thresholds: RiskThresholds,
    pub explain: ExplainConfig,
    pub logging: LoggingConfig,
}

/// Model artifact settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Inferred from the file extension when absent
    pub format: Option<ArtifactFormat>,
    pub backend: BackendKind,
    /// Blake3 hex fingerprint the artifact must match
    pub expected_hash: Option<String>,
}

/// Feature column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub features: FeatureSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            schema: SchemaConfig::default(),
            defaults: DefaultTable::credit_default(),
            thresholds: RiskThresholds::default(),
            explain: ExplainConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/credit_default_v1.json"),
            format: None,
            backend: BackendKind::Classifier,
            expected_hash: None,
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            features: FeatureSchema::credit_default(),
        }
    }
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl RiskConfig {
    /// Parse a TOML document; absent sections take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RiskError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RiskError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// The file when given, otherwise the built-in defaults
    ///
    /// Environment overrides are applied separately so callers can install
    /// a subscriber first and see the warnings for ignored values.
    pub fn from_path_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// `RISK_LOG_LEVEL` when set, otherwise the configured level
    pub fn effective_log_level(&self) -> String {
        env::var("RISK_LOG_LEVEL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.logging.level.clone())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup; unparseable values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RISK_MODEL_PATH") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.model.path = PathBuf::from(trimmed);
            }
        }

        if let Some(value) = lookup("RISK_MODEL_FORMAT") {
            match value.parse::<ArtifactFormat>() {
                Ok(format) => self.model.format = Some(format),
                Err(e) => warn!("ignoring RISK_MODEL_FORMAT: {e}"),
            }
        }

        if let Some(value) = lookup("RISK_MODEL_HASH") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.model.expected_hash = Some(trimmed.to_string());
            }
        }

        if let Some(value) = lookup("RISK_BACKEND") {
            match value.parse::<BackendKind>() {
                Ok(kind) => self.model.backend = kind,
                Err(e) => warn!("ignoring RISK_BACKEND: {e}"),
            }
        }

        if let Some(value) = lookup("RISK_THRESHOLD_HIGH") {
            match value.trim().parse::<f64>() {
                Ok(v) => self.thresholds.high = v,
                Err(_) => warn!("ignoring RISK_THRESHOLD_HIGH={value}"),
            }
        }

        if let Some(value) = lookup("RISK_THRESHOLD_MEDIUM") {
            match value.trim().parse::<f64>() {
                Ok(v) => self.thresholds.medium = v,
                Err(_) => warn!("ignoring RISK_THRESHOLD_MEDIUM={value}"),
            }
        }

        if let Some(value) = lookup("RISK_EXPLAIN") {
            match parse_bool(&value) {
                Some(enabled) => self.explain.enabled = enabled,
                None => warn!("ignoring RISK_EXPLAIN={value}"),
            }
        }

        if let Some(value) = lookup("RISK_LOG_LEVEL") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                self.logging.level = trimmed.to_string();
            }
        }
    }

    /// Reject thresholds out of order and schema fields without defaults
    pub fn validate(&self) -> Result<()> {
        self.thresholds
            .validate()
            .map_err(|e| RiskError::Config(e.to_string()))?;
        self.defaults
            .check_covers(&self.schema.features)
            .map_err(|e| RiskError::Config(format!("default table incomplete: {e}")))?;
        Ok(())
    }

    /// Where and how the model artifact is loaded
    pub fn artifact_source(&self) -> ArtifactSource {
        let mut source = ArtifactSource::new(
            self.model.path.clone(),
            self.model.backend,
            self.schema.features.clone(),
        );
        if let Some(format) = self.model.format {
            source = source.with_format(format);
        }
        if let Some(hash) = &self.model.expected_hash {
            source = source.with_expected_hash(hash.clone());
        }
        source
    }
}
