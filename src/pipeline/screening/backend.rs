use std::path::PathBuf;

use super::ScreeningError;
use crate::pipeline::preprocess::InputTensor;

/// What a backend needs to materialize the screening model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub model_path: PathBuf,
    pub input_name: String,
    /// `[1, S, S, 3]`.
    pub input_shape: [usize; 4],
}

impl ModelSpec {
    /// Reject a tensor whose shape differs from the declared input.
    pub fn check_input(&self, tensor: &InputTensor) -> Result<(), ScreeningError> {
        if tensor.shape() != self.input_shape {
            return Err(ScreeningError::Inference(format!(
                "input shape {:?} does not match model input {:?}",
                tensor.shape(),
                self.input_shape
            )));
        }
        Ok(())
    }
}

/// A model ready to execute. `run` takes `&mut self` because runtimes
/// generally need exclusive access to their session.
pub trait LoadedModel: Send {
    /// Execute one forward pass, returning the flat output scores.
    fn run(&mut self, input_name: &str, tensor: &InputTensor) -> Result<Vec<f32>, ScreeningError>;
}

/// Loads models. Called once per engine, on the blocking pool.
pub trait ModelBackend: Send + Sync {
    fn load(&self, spec: &ModelSpec) -> Result<Box<dyn LoadedModel>, ScreeningError>;
}
