//! Frame → model input tensor.
//!
//! Output is always `[1, S, S, 3]` NHWC `f32`. Cropping and resizing go
//! through `image::imageops`; normalized values land in pooled storage.

pub mod pool;
pub mod sampling;

pub use pool::{BufferPool, PooledBuffer};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::frame::{FrameError, PixelBuffer};
use sampling::Region;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Target size must be non-zero")]
    ZeroTargetSize,

    #[error("Tensor shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Unusable frame: {0}")]
    Frame(#[from] FrameError),
}

/// How a non-square frame becomes square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Resize straight to `S x S`, distorting the aspect ratio.
    Stretch,
    /// Crop the largest centred square, then resize.
    CenterCrop,
}

/// Pixel scaling the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// 0..=255 as float.
    Raw,
    /// `/255` → `[0, 1]`.
    Unit,
    /// `/127.5 - 1` → `[-1, 1]`.
    Signed,
}

impl Normalization {
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            Self::Raw => value,
            Self::Unit => value / 255.0,
            Self::Signed => value / 127.5 - 1.0,
        }
    }
}

/// A model input tensor backed by pooled storage.
#[derive(Debug)]
pub struct InputTensor {
    size: usize,
    data: PooledBuffer,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size, self.size, 3]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Preprocessing parameters of the active model, plus the buffer arena.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_size: usize,
    mode: ResizeMode,
    normalization: Normalization,
    pool: BufferPool,
}

impl Preprocessor {
    pub fn new(
        target_size: usize,
        mode: ResizeMode,
        normalization: Normalization,
    ) -> Result<Self, PreprocessError> {
        if target_size == 0 {
            return Err(PreprocessError::ZeroTargetSize);
        }
        Ok(Self {
            target_size,
            mode,
            normalization,
            pool: BufferPool::new(),
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    fn element_count(&self) -> usize {
        self.target_size * self.target_size * 3
    }

    /// Resize, crop and normalize `frame` into a `[1, S, S, 3]` tensor.
    pub fn preprocess(&self, frame: &PixelBuffer) -> Result<InputTensor, PreprocessError> {
        let region = match self.mode {
            ResizeMode::Stretch => Region::full(frame),
            ResizeMode::CenterCrop => Region::center_square(frame),
        };

        let size = self.target_size as u32;
        let resized = sampling::crop_and_resize(frame.to_rgb_image()?, region, size);

        let mut data = self.pool.acquire(self.element_count());
        for (slot, value) in data.iter_mut().zip(resized.as_raw()) {
            *slot = self.normalization.apply(*value as f32);
        }

        self.wrap(data)
    }

    /// All-zero tensor of the input shape, used for warm-up.
    pub fn zeros(&self) -> InputTensor {
        InputTensor {
            size: self.target_size,
            data: self.pool.acquire(self.element_count()),
        }
    }

    fn wrap(&self, data: PooledBuffer) -> Result<InputTensor, PreprocessError> {
        let expected = self.element_count();
        if data.len() != expected {
            return Err(PreprocessError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(InputTensor {
            size: self.target_size,
            data,
        })
    }
}
