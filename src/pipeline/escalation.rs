//! Escalation policy: one final result per capture event.
//!
//! Healthy-looking leaves stop at the screening result. Anything else goes to
//! the expert model, and when the expert is unreachable the screening engine
//! answers instead, tagged `expert-local-fallback`.

use thiserror::Error;
use tracing::{info, warn};

use crate::model_service::OperationKind;
use crate::pipeline::capture::CaptureArtifact;
use crate::pipeline::expert::ExpertClient;
use crate::pipeline::screening::{FramePredictor, LabelSet, ScreeningError};
use crate::pipeline::types::{InferenceResult, Label, SourceModel};

#[derive(Error, Debug)]
pub enum EscalationError {
    #[error("Neither the screening model nor the expert model produced a result")]
    NoResult,
}

#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    healthy_label: Label,
}

impl EscalationPolicy {
    /// `healthy_label` must be part of the active label set.
    pub fn new(labels: &LabelSet, healthy_label: &str) -> Result<Self, ScreeningError> {
        let healthy_label = labels.find(healthy_label).cloned().ok_or_else(|| {
            ScreeningError::Labels(format!("healthy label '{healthy_label}' is not in the label set"))
        })?;
        Ok(Self { healthy_label })
    }

    pub fn healthy_label(&self) -> &Label {
        &self.healthy_label
    }

    fn is_healthy(&self, result: &InferenceResult) -> bool {
        result.label == self.healthy_label
    }

    /// Decide the final result for `artifact`.
    ///
    /// `screening` is the result already computed for this still (the live
    /// loop's latest one, say); `None` means compute it now.
    pub async fn resolve(
        &self,
        artifact: &CaptureArtifact,
        screening: Option<InferenceResult>,
        escalate: bool,
        predictor: &dyn FramePredictor,
        expert: &dyn ExpertClient,
    ) -> Result<InferenceResult, EscalationError> {
        let screening = match screening {
            Some(result) => Some(result),
            None => predictor.predict(artifact.pixels(), OperationKind::Capture).await,
        };

        let Some(screening) = screening else {
            if !escalate {
                return Err(EscalationError::NoResult);
            }
            // Screening model missing or failed: the expert is the only option.
            info!(id = %artifact.id(), "No screening result, sending capture straight to expert");
            return expert.predict_expert(artifact).await.map_err(|e| {
                warn!(id = %artifact.id(), error = %e, "Expert unavailable and no screening result");
                EscalationError::NoResult
            });
        };

        if !escalate {
            return Ok(screening);
        }
        if self.is_healthy(&screening) {
            info!(
                id = %artifact.id(),
                confidence = screening.confidence,
                "Leaf screened healthy, expert not consulted"
            );
            return Ok(screening);
        }

        match expert.predict_expert(artifact).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(
                    id = %artifact.id(),
                    error = %e,
                    "Expert model unavailable, falling back to on-device screening"
                );
                let rerun = predictor
                    .predict(artifact.pixels(), OperationKind::FallbackRerun)
                    .await;
                Ok(rerun
                    .unwrap_or(screening)
                    .retag(SourceModel::ExpertLocalFallback))
            }
        }
    }
}
