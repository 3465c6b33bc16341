//! On-device screening classifier.
//!
//! `ScreeningEngine` owns the model lifecycle (load, warm-up, self-check)
//! and turns frames into ranked `InferenceResult`s. The model itself sits
//! behind `ModelBackend` so tests and alternative runtimes plug in without
//! touching the engine.

pub mod backend;
pub mod engine;
pub mod labels;
pub mod ranking;

#[cfg(feature = "onnx-runtime")]
pub mod onnx;

pub use backend::{LoadedModel, ModelBackend, ModelSpec};
pub use engine::{EngineStatus, FramePredictor, ScreeningEngine};
pub use labels::LabelSet;
pub use ranking::rank;

#[cfg(feature = "onnx-runtime")]
pub use onnx::OnnxBackend;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreeningError {
    #[error("Model not found at {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Warm-up inference failed: {0}")]
    WarmUp(String),

    #[error("Model output has {actual} scores but the label set has {expected}")]
    OutputMismatch { expected: usize, actual: usize },

    #[error("Model failed to load earlier: {0}")]
    LoadFailed(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid label set: {0}")]
    Labels(String),
}
