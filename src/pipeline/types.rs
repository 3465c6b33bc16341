use std::fmt;

use serde::{Deserialize, Serialize};

/// A class identifier from the active label set.
///
/// Inside the crate only `LabelSet` creates labels. Deserialized values
/// (stored reports, host payloads) are taken as-is and are not checked
/// against any label set; use `LabelSet::resolve` when that matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form: `bacterial_leaf_blight` → `bacterial leaf blight`.
    pub fn display_name(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which engine produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceModel {
    #[serde(rename = "screening")]
    Screening,
    #[serde(rename = "expert-server")]
    ExpertServer,
    /// Expert was requested but unreachable; the screening engine answered.
    #[serde(rename = "expert-local-fallback")]
    ExpertLocalFallback,
}

impl SourceModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screening => "screening",
            Self::ExpertServer => "expert-server",
            Self::ExpertLocalFallback => "expert-local-fallback",
        }
    }
}

impl fmt::Display for SourceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One label with its raw model score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: Label,
    pub score: f32,
}

/// Scores for every label, highest first.
pub type RankedPrediction = Vec<LabelScore>;

/// The single result shape every stage produces and every consumer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub label: Label,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub source_model: SourceModel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_predictions: Option<RankedPrediction>,
}

impl InferenceResult {
    pub fn new(label: Label, confidence: f32, source_model: SourceModel) -> Self {
        Self {
            label,
            confidence: clamp_confidence(confidence),
            source_model,
            all_predictions: None,
        }
    }

    pub fn with_predictions(mut self, ranked: RankedPrediction) -> Self {
        self.all_predictions = Some(ranked);
        self
    }

    /// Same prediction, attributed to another engine.
    pub fn retag(mut self, source_model: SourceModel) -> Self {
        self.source_model = source_model;
        self
    }

    /// `0.7` → `"70.0%"`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

/// Map any score into `[0, 1]`; non-finite scores become `0`.
pub(crate) fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
