use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn, Instrument};

use super::backend::{ModelBackend, ModelSpec};
use super::labels::LabelSet;
use super::ranking::rank;
use super::ScreeningError;
use crate::config::ScanConfig;
use crate::model_service::{ModelService, OperationKind};
use crate::pipeline::frame::PixelBuffer;
use crate::pipeline::preprocess::Preprocessor;
use crate::pipeline::types::{InferenceResult, SourceModel};

/// Model lifecycle as the UI sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineStatus {
    Unloaded,
    Loading,
    Ready,
    /// Terminal; every later `load()` returns the same reason.
    Failed { reason: String },
}

/// Anything that can screen a frame. Never errors: `None` means no result.
#[async_trait]
pub trait FramePredictor: Send + Sync {
    async fn predict(&self, frame: &PixelBuffer, kind: OperationKind) -> Option<InferenceResult>;
}

/// On-device screening classifier.
///
/// `Unloaded → Loading → Ready`, or `Loading → Failed`. The model is loaded
/// lazily on the first `load()`, warmed up once and kept for the session.
pub struct ScreeningEngine {
    backend: Arc<dyn ModelBackend>,
    service: Arc<ModelService>,
    preprocessor: Preprocessor,
    labels: LabelSet,
    spec: ModelSpec,
    load_gate: Mutex<()>,
    status: watch::Sender<EngineStatus>,
}

impl ScreeningEngine {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        service: Arc<ModelService>,
        preprocessor: Preprocessor,
        labels: LabelSet,
        model_path: &Path,
        input_name: &str,
    ) -> Self {
        let size = preprocessor.target_size();
        let spec = ModelSpec {
            model_path: model_path.to_path_buf(),
            input_name: input_name.to_string(),
            input_shape: [1, size, size, 3],
        };
        let (status, _) = watch::channel(EngineStatus::Unloaded);
        Self {
            backend,
            service,
            preprocessor,
            labels,
            spec,
            load_gate: Mutex::new(()),
            status,
        }
    }

    /// Build from configuration. Reads `labels.txt` when one is configured.
    pub fn from_config(
        config: &ScanConfig,
        backend: Arc<dyn ModelBackend>,
        service: Arc<ModelService>,
    ) -> Result<Self, ScreeningError> {
        let labels = match &config.labels_path {
            Some(path) => LabelSet::from_file(path)?,
            None => LabelSet::paddy(),
        };
        let preprocessor = Preprocessor::new(
            config.target_size as usize,
            config.resize_mode,
            config.normalization,
        )
        .map_err(|e| ScreeningError::ModelInit(e.to_string()))?;

        Ok(Self::new(
            backend,
            service,
            preprocessor,
            labels,
            &config.model_path,
            &config.input_name,
        ))
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn service(&self) -> &Arc<ModelService> {
        &self.service
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Receiver that sees every status transition.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.status.borrow(), EngineStatus::Ready)
    }

    /// Load and warm up the model. Idempotent.
    ///
    /// Concurrent callers queue on one gate; only the first does the work,
    /// the rest observe its outcome.
    pub async fn load(&self) -> Result<(), ScreeningError> {
        if let Some(outcome) = self.settled() {
            return outcome;
        }

        let _gate = self.load_gate.lock().await;
        if let Some(outcome) = self.settled() {
            return outcome;
        }

        self.status.send_replace(EngineStatus::Loading);
        let span = tracing::info_span!("screening_load", model = %self.spec.model_path.display());
        match self.load_and_warm_up().instrument(span).await {
            Ok(()) => {
                self.status.send_replace(EngineStatus::Ready);
                info!(labels = self.labels.len(), "Screening model ready");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Screening model failed to load");
                self.status.send_replace(EngineStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Outcome of a finished load, if there is one.
    fn settled(&self) -> Option<Result<(), ScreeningError>> {
        match &*self.status.borrow() {
            EngineStatus::Ready => Some(Ok(())),
            EngineStatus::Failed { reason } => Some(Err(ScreeningError::LoadFailed(reason.clone()))),
            EngineStatus::Unloaded | EngineStatus::Loading => None,
        }
    }

    async fn load_and_warm_up(&self) -> Result<(), ScreeningError> {
        let backend = Arc::clone(&self.backend);
        let spec = self.spec.clone();
        let model = tokio::task::spawn_blocking(move || backend.load(&spec))
            .await
            .map_err(|e| ScreeningError::ModelInit(e.to_string()))??;

        self.service
            .install(model, &self.spec.model_path)
            .map_err(|e| ScreeningError::ModelInit(e.to_string()))?;

        let output = self
            .service
            .run(OperationKind::WarmUp, &self.spec.input_name, self.preprocessor.zeros())
            .await
            .map_err(|e| ScreeningError::WarmUp(e.to_string()))?;

        if output.len() != self.labels.len() {
            return Err(ScreeningError::OutputMismatch {
                expected: self.labels.len(),
                actual: output.len(),
            });
        }
        debug!(outputs = output.len(), "Warm-up inference complete");
        Ok(())
    }

    async fn run_prediction(
        &self,
        frame: &PixelBuffer,
        kind: OperationKind,
    ) -> Result<InferenceResult, ScreeningError> {
        let tensor = self
            .preprocessor
            .preprocess(frame)
            .map_err(|e| ScreeningError::Inference(e.to_string()))?;

        let scores = self.service.run(kind, &self.spec.input_name, tensor).await?;
        if scores.len() != self.labels.len() {
            return Err(ScreeningError::OutputMismatch {
                expected: self.labels.len(),
                actual: scores.len(),
            });
        }

        let ranked = rank(&self.labels, &scores);
        let top = ranked
            .first()
            .ok_or_else(|| ScreeningError::Inference("empty output".into()))?;
        Ok(InferenceResult::new(top.label.clone(), top.score, SourceModel::Screening)
            .with_predictions(ranked))
    }
}

#[async_trait]
impl FramePredictor for ScreeningEngine {
    async fn predict(&self, frame: &PixelBuffer, kind: OperationKind) -> Option<InferenceResult> {
        if !self.is_ready() {
            debug!(%kind, "Screening model not ready, skipping prediction");
            return None;
        }

        match self.run_prediction(frame, kind).await {
            Ok(result) => {
                debug!(
                    %kind,
                    label = %result.label,
                    confidence = result.confidence,
                    "Screening prediction"
                );
                Some(result)
            }
            Err(e) => {
                warn!(%kind, error = %e, "Screening prediction failed");
                None
            }
        }
    }
}
