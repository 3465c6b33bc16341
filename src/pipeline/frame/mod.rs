//! Frame sources: live camera streams and decoded still images, both
//! reduced to one `PixelBuffer` shape for the preprocessor.

pub mod types;
pub mod camera;
pub mod still;

pub use types::*;
pub use camera::*;
pub use still::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera available for {0} facing")]
    NoCamera(Facing),

    #[error("Camera is already in use")]
    Busy,

    #[error("Camera feed closed before producing a frame")]
    FeedClosed,

    #[error("No camera frame available yet")]
    NoFrame,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Image too small ({0} bytes)")]
    TooSmall(usize),

    #[error("Image too large ({0} bytes)")]
    TooLarge(usize),

    #[error("Invalid pixel buffer: {0}")]
    InvalidBuffer(String),

    #[error("Failed to encode still image: {0}")]
    Encode(String),
}

impl FrameError {
    /// Camera-side failures (permission, hardware, feed) as opposed to bad image bytes.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::NoCamera(_) | Self::Busy | Self::FeedClosed
        )
    }
}
