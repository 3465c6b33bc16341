use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use super::FrameError;

/// Which way the camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear camera, the default for photographing leaves.
    Environment,
    User,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::User => write!(f, "user"),
        }
    }
}

/// Channel layout of a `PixelBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    /// Canvas/video frames arrive as RGBA; alpha is ignored downstream.
    Rgba8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }
}

/// Raw interleaved 8-bit pixels plus dimensions.
#[derive(Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl PixelBuffer {
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidBuffer(format!(
                "zero dimension {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(FrameError::InvalidBuffer(format!(
                "{width}x{height} {format:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            format: PixelFormat::Rgb8,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGB of the pixel at `(x, y)`. Caller keeps coordinates in bounds.
    #[inline]
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let channels = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Copy into an `RgbImage`, dropping alpha.
    pub fn to_rgb_image(&self) -> Result<RgbImage, FrameError> {
        match self.format {
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone()),
            PixelFormat::Rgba8 => RgbaImage::from_raw(self.width, self.height, self.data.clone())
                .map(|rgba| DynamicImage::ImageRgba8(rgba).to_rgb8()),
        }
        .ok_or_else(|| FrameError::InvalidBuffer("buffer does not match dimensions".into()))
    }

    /// Encode as JPEG, the format handed to the expert endpoint.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, FrameError> {
        let image = DynamicImage::ImageRgb8(self.to_rgb_image()?);

        let mut out = Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Jpeg)
            .map_err(|e| FrameError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}

/// What a frame source currently holds.
#[derive(Debug, Clone)]
pub enum FrameState {
    /// No decodable frame yet (stream metadata not loaded).
    Pending,
    Ready(Arc<PixelBuffer>),
}

/// Anything the live loop can sample a frame from.
pub trait FrameSource: Send + Sync {
    fn current_frame(&self) -> FrameState;
}

/// A `FrameSource` over one still image; always ready.
pub struct StillFrame {
    frame: Arc<PixelBuffer>,
}

impl StillFrame {
    pub fn new(frame: PixelBuffer) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }
}

impl FrameSource for StillFrame {
    fn current_frame(&self) -> FrameState {
        FrameState::Ready(self.frame.clone())
    }
}
