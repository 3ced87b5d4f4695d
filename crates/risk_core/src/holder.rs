//! Lazily loaded, process-wide model holder
//!
//! The artifact is read at most once per [`ModelHolder`]: concurrent first
//! callers block until the single load finishes and then share the same
//! [`LoadedModel`]. A failed load is not cached, so the caller decides whether
//! to retry or abort.

use crate::backend::{BackendKind, InferenceBackend};
use crate::errors::Result;
use crate::explain::{ExplainError, TreeExplainer};
use crate::gbdt::{Ensemble, ModelError};
use crate::schema::FeatureSchema;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// On-disk encoding of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    /// `.bin`/`.bincode` are bincode, everything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") || ext.eq_ignore_ascii_case("bincode") => {
                ArtifactFormat::Bincode
            }
            _ => ArtifactFormat::Json,
        }
    }
}

impl std::str::FromStr for ArtifactFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ArtifactFormat::Json),
            "bincode" | "bin" => Ok(ArtifactFormat::Bincode),
            other => Err(format!("unknown artifact format `{other}`")),
        }
    }
}

/// Where and how to load the model
#[derive(Debug, Clone)]
pub struct ArtifactSource {
    pub path: PathBuf,
    pub format: ArtifactFormat,
    pub backend: BackendKind,
    /// Blake3 hex of the canonical model JSON, checked when present
    pub expected_hash: Option<String>,
    pub schema: FeatureSchema,
}

impl ArtifactSource {
    pub fn new(path: impl Into<PathBuf>, backend: BackendKind, schema: FeatureSchema) -> Self {
        let path = path.into();
        Self {
            format: ArtifactFormat::from_path(&path),
            path,
            backend,
            expected_hash: None,
            schema,
        }
    }

    pub fn with_format(mut self, format: ArtifactFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_expected_hash(mut self, hash: impl Into<String>) -> Self {
        self.expected_hash = Some(hash.into());
        self
    }

    /// Read, verify and wrap the artifact
    #[instrument(skip(self), fields(path = %self.path.display(), backend = %self.backend))]
    pub fn load(&self) -> Result<LoadedModel> {
        let start = Instant::now();

        let ensemble = match self.format {
            ArtifactFormat::Json => Ensemble::load_json(&self.path),
            ArtifactFormat::Bincode => Ensemble::load_bincode(&self.path),
        }?;

        let model = LoadedModel::new(self.backend, ensemble, &self.schema)?;

        if let Some(expected) = &self.expected_hash {
            if !expected.eq_ignore_ascii_case(model.hash()) {
                return Err(ModelError::HashMismatch {
                    expected: expected.clone(),
                    actual: model.hash().to_string(),
                }
                .into());
            }
        }

        info!(
            hash = %model.hash(),
            trees = model.backend().ensemble().num_trees(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(model)
    }
}

/// A ready-to-serve model: backend, fingerprint and cached explainer
pub struct LoadedModel {
    backend: InferenceBackend,
    hash: String,
    explainer: OnceCell<TreeExplainer>,
}

impl LoadedModel {
    /// Check the ensemble against `schema` and wrap it in `kind`
    pub fn new(kind: BackendKind, ensemble: Ensemble, schema: &FeatureSchema) -> Result<Self> {
        ensemble.validate()?;
        if !schema.matches(&ensemble.feature_names) {
            return Err(ModelError::SchemaMismatch {
                expected: schema.names().to_vec(),
                actual: ensemble.feature_names.clone(),
            }
            .into());
        }

        let hash = ensemble.hash_hex()?;
        let backend = InferenceBackend::from_ensemble(kind, ensemble)?;
        Ok(Self {
            backend,
            hash,
            explainer: OnceCell::new(),
        })
    }

    pub fn backend(&self) -> &InferenceBackend {
        &self.backend
    }

    /// Blake3 hex fingerprint of the canonical model
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Attribution engine, built on first use and reused afterwards
    pub fn explainer(&self) -> std::result::Result<&TreeExplainer, ExplainError> {
        let ensemble = match &self.backend {
            InferenceBackend::Classifier(classifier) => classifier.shared_ensemble(),
            InferenceBackend::Booster(_) => {
                return Err(ExplainError::Unsupported(BackendKind::Booster))
            }
        };
        self.explainer.get_or_try_init(|| {
            debug!("building tree explainer");
            TreeExplainer::new(ensemble)
        })
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("backend", &self.backend.kind())
            .field("hash", &self.hash)
            .field("explainer_ready", &self.explainer.get().is_some())
            .finish()
    }
}

type Loader = Box<dyn Fn() -> Result<LoadedModel> + Send + Sync>;

/// Write-once holder for the process model
pub struct ModelHolder {
    loader: Loader,
    cell: OnceCell<Arc<LoadedModel>>,
}

impl ModelHolder {
    /// Holder that loads from `source` on first access
    pub fn from_source(source: ArtifactSource) -> Self {
        Self::with_loader(move || source.load())
    }

    /// Holder with a custom load routine
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<LoadedModel> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            cell: OnceCell::new(),
        }
    }

    /// Holder around an already loaded model
    pub fn preloaded(model: LoadedModel) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Arc::new(model));
        Self {
            loader: Box::new(|| {
                Err(ModelError::InvalidFormat("preloaded holder has no loader".to_string()).into())
            }),
            cell,
        }
    }

    /// Load if absent, then return the shared model
    pub fn get(&self) -> Result<Arc<LoadedModel>> {
        self.cell
            .get_or_try_init(|| (self.loader)().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl fmt::Debug for ModelHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHolder")
            .field("model", &self.cell.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RiskError;
    use crate::gbdt::{Node, Objective, Tree};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["AGE", "PAY_0"]).unwrap()
    }

    fn ensemble() -> Ensemble {
        let tree = Tree::new(
            vec![
                Node::internal(0, 1, 0.5, 1, 2, 10.0),
                Node::leaf(1, -0.5, 8.0),
                Node::leaf(2, 0.9, 2.0),
            ],
            1.0,
        );
        Ensemble::new(
            vec!["AGE".into(), "PAY_0".into()],
            Objective::BinaryLogistic,
            -1.0,
            vec![tree],
        )
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ArtifactFormat::from_path(Path::new("m.json")), ArtifactFormat::Json);
        assert_eq!(ArtifactFormat::from_path(Path::new("m.BIN")), ArtifactFormat::Bincode);
        assert_eq!(ArtifactFormat::from_path(Path::new("model")), ArtifactFormat::Json);
        assert_eq!("bincode".parse::<ArtifactFormat>(), Ok(ArtifactFormat::Bincode));
    }

    #[test]
    fn schema_mismatch_is_a_load_error() {
        let other = FeatureSchema::new(["PAY_0", "AGE"]).unwrap();
        let err = LoadedModel::new(BackendKind::Classifier, ensemble(), &other).unwrap_err();
        assert!(matches!(
            err,
            RiskError::ArtifactLoad(ModelError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn loads_json_and_bincode_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("model.json");
        let bin = dir.path().join("model.bin");
        ensemble().save_json(&json).unwrap();
        ensemble().save_bincode(&bin).unwrap();

        let a = ArtifactSource::new(&json, BackendKind::Classifier, schema()).load().unwrap();
        let b = ArtifactSource::new(&bin, BackendKind::Booster, schema()).load().unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(b.backend().kind(), BackendKind::Booster);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = ArtifactSource::new("/nonexistent/model.json", BackendKind::Classifier, schema())
            .load()
            .unwrap_err();
        assert!(matches!(err, RiskError::ArtifactLoad(ModelError::IoError(_))));
        assert!(!err.is_request_scoped());
    }

    #[test]
    fn hash_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        ensemble().save_json(&path).unwrap();
        let good = ensemble().hash_hex().unwrap();

        let ok = ArtifactSource::new(&path, BackendKind::Classifier, schema())
            .with_expected_hash(good.to_uppercase())
            .load();
        assert!(ok.is_ok());

        let bad = ArtifactSource::new(&path, BackendKind::Classifier, schema())
            .with_expected_hash("00".repeat(32))
            .load();
        assert!(matches!(
            bad,
            Err(RiskError::ArtifactLoad(ModelError::HashMismatch { .. }))
        ));
    }

    #[test]
    fn concurrent_first_access_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let holder = Arc::new(ModelHolder::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            LoadedModel::new(BackendKind::Classifier, ensemble(), &schema())
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let holder = Arc::clone(&holder);
                thread::spawn(move || holder.get().unwrap())
            })
            .collect();
        let models: Vec<Arc<LoadedModel>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(models.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert!(holder.is_loaded());
    }

    #[test]
    fn failed_load_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let holder = ModelHolder::with_loader(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ModelError::InvalidFormat("first attempt".into()).into())
            } else {
                LoadedModel::new(BackendKind::Classifier, ensemble(), &schema())
            }
        });

        assert!(holder.get().is_err());
        assert!(!holder.is_loaded());
        assert!(holder.get().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn explainer_is_cached_and_booster_has_none() {
        let model = LoadedModel::new(BackendKind::Classifier, ensemble(), &schema()).unwrap();
        let first = model.explainer().unwrap() as *const TreeExplainer;
        let second = model.explainer().unwrap() as *const TreeExplainer;
        assert_eq!(first, second);

        let booster = LoadedModel::new(BackendKind::Booster, ensemble(), &schema()).unwrap();
        assert_eq!(
            booster.explainer().unwrap_err(),
            ExplainError::Unsupported(BackendKind::Booster)
        );
    }
}
