//! ONNX Runtime backend, behind the `onnx-runtime` feature.
//!
//! Expects `model.onnx` at the configured path. External weight data
//! (`model.onnx.data`) next to it is picked up by the runtime.

use ort::session::Session;
use ort::value::TensorRef;

use super::backend::{LoadedModel, ModelBackend, ModelSpec};
use super::ScreeningError;
use crate::pipeline::preprocess::InputTensor;

pub struct OnnxBackend {
    intra_threads: usize,
}

impl OnnxBackend {
    pub fn new(intra_threads: usize) -> Self {
        Self {
            intra_threads: intra_threads.max(1),
        }
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new(2)
    }
}

impl ModelBackend for OnnxBackend {
    fn load(&self, spec: &ModelSpec) -> Result<Box<dyn LoadedModel>, ScreeningError> {
        if !spec.model_path.exists() {
            return Err(ScreeningError::ModelNotFound(spec.model_path.clone()));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ScreeningError::ModelInit(e.to_string()))?
            .with_intra_threads(self.intra_threads)
            .map_err(|e: ort::Error| ScreeningError::ModelInit(e.to_string()))?
            .commit_from_file(&spec.model_path)
            .map_err(|e: ort::Error| ScreeningError::ModelInit(format!("ONNX load failed: {e}")))?;

        tracing::info!(path = %spec.model_path.display(), "ONNX screening model loaded");

        Ok(Box::new(OnnxModel {
            session,
            spec: spec.clone(),
        }))
    }
}

struct OnnxModel {
    session: Session,
    spec: ModelSpec,
}

impl LoadedModel for OnnxModel {
    fn run(&mut self, input_name: &str, tensor: &InputTensor) -> Result<Vec<f32>, ScreeningError> {
        self.spec.check_input(tensor)?;
        let [n, h, w, c] = self.spec.input_shape;
        let view = ndarray::ArrayView4::from_shape((n, h, w, c), tensor.as_slice())
            .map_err(|e| ScreeningError::Inference(e.to_string()))?;
        let input = TensorRef::from_array_view(&view)
            .map_err(|e| ScreeningError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_name => input])
            .map_err(|e| ScreeningError::Inference(format!("ONNX inference failed: {e}")))?;

        // Output shape: [1, num_labels]
        let (_shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScreeningError::Inference(format!("Output extraction: {e}")))?;

        Ok(scores.to_vec())
    }
}
