//! Request pipeline: reconcile, predict, classify, optionally explain

use crate::config::RiskConfig;
use crate::errors::{Result, RiskError};
use crate::explain::{Attribution, ExplainError};
use crate::holder::{LoadedModel, ModelHolder};
use crate::reconcile::reconcile;
use crate::schema::{DefaultTable, FeatureSchema, FeatureVector, PartialInput};
use crate::tier::{PredictionResult, RiskThresholds};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Everything produced for one request
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Reconciled row the model saw
    pub vector: FeatureVector,
    pub prediction: PredictionResult,
    /// Absent when disabled, unsupported by the backend, or failed
    pub explanation: Option<Attribution>,
    /// Fingerprint of the model that served the request
    pub model_hash: String,
}

/// Credit default scoring over a lazily loaded model
#[derive(Debug)]
pub struct RiskService {
    holder: ModelHolder,
    schema: FeatureSchema,
    defaults: DefaultTable,
    thresholds: RiskThresholds,
    explain: bool,
}

impl RiskService {
    pub fn new(
        holder: ModelHolder,
        schema: FeatureSchema,
        defaults: DefaultTable,
        thresholds: RiskThresholds,
    ) -> Result<Self> {
        thresholds
            .validate()
            .map_err(|e| RiskError::Config(e.to_string()))?;
        defaults.check_covers(&schema)?;
        Ok(Self {
            holder,
            schema,
            defaults,
            thresholds,
            explain: true,
        })
    }

    /// Service for a validated configuration; the model is not read yet
    pub fn from_config(config: &RiskConfig) -> Result<Self> {
        config.validate()?;
        let holder = ModelHolder::from_source(config.artifact_source());
        Ok(Self::new(
            holder,
            config.schema.features.clone(),
            config.defaults.clone(),
            config.thresholds,
        )?
        .with_explanations(config.explain.enabled))
    }

    pub fn with_explanations(mut self, enabled: bool) -> Self {
        self.explain = enabled;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Force the model load so artifact problems surface at startup
    pub fn warm_up(&self) -> Result<Arc<LoadedModel>> {
        self.holder.get()
    }

    /// Probability of default and risk tier
    #[instrument(skip_all, fields(inputs = partial.len()))]
    pub fn predict(&self, partial: &PartialInput) -> Result<PredictionResult> {
        let model = self.holder.get()?;
        let vector = reconcile(&self.schema, partial, &self.defaults)?;
        self.score(&model, &vector)
    }

    /// Prediction plus attribution when available
    ///
    /// An attribution failure never fails the request; it is logged and the
    /// explanation is left out.
    #[instrument(skip_all, fields(inputs = partial.len()))]
    pub fn assess(&self, partial: &PartialInput) -> Result<Assessment> {
        let model = self.holder.get()?;
        let vector = reconcile(&self.schema, partial, &self.defaults)?;
        let prediction = self.score(&model, &vector)?;

        let explanation = if self.explain {
            match model.explainer().and_then(|e| e.explain(&vector)) {
                Ok(attribution) => Some(attribution),
                Err(ExplainError::Unsupported(kind)) => {
                    debug!(backend = %kind, "no attribution for backend");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "attribution failed, returning prediction only");
                    None
                }
            }
        } else {
            None
        };

        Ok(Assessment {
            vector,
            prediction,
            explanation,
            model_hash: model.hash().to_string(),
        })
    }

    fn score(&self, model: &LoadedModel, vector: &FeatureVector) -> Result<PredictionResult> {
        let probability = model.backend().predict_default_probability(vector)?;
        let result = PredictionResult::new(probability, &self.thresholds);
        debug!(probability, tier = %result.tier, "scored");
        Ok(result)
    }
}
