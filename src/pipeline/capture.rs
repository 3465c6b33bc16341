//! Capture artifacts and the slot that owns the current one.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::frame::{decode_still_image, FrameError, PixelBuffer};
use crate::pipeline::types::InferenceResult;

/// File name given to camera stills.
pub const CAMERA_FILE_NAME: &str = "capture.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOrigin {
    Camera,
    Upload,
}

/// One still image: the encoded bytes sent to the expert plus the decoded
/// pixels the screening engine reads.
#[derive(Debug, Clone)]
pub struct CaptureArtifact {
    id: Uuid,
    bytes: Vec<u8>,
    mime: String,
    file_name: String,
    captured_at: DateTime<Utc>,
    origin: CaptureOrigin,
    pixels: Arc<PixelBuffer>,
}

impl CaptureArtifact {
    /// JPEG-encode a live camera frame.
    pub fn from_camera_frame(frame: Arc<PixelBuffer>) -> Result<Self, FrameError> {
        let bytes = frame.encode_jpeg()?;
        Ok(Self {
            id: Uuid::new_v4(),
            bytes,
            mime: "image/jpeg".into(),
            file_name: CAMERA_FILE_NAME.into(),
            captured_at: Utc::now(),
            origin: CaptureOrigin::Camera,
            pixels: frame,
        })
    }

    /// Decode an uploaded file. The original bytes are kept as-is for the expert.
    pub fn from_upload(bytes: Vec<u8>, file_name: &str) -> Result<Self, FrameError> {
        let pixels = decode_still_image(&bytes)?;
        let mime = image::guess_format(&bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = match file_name.trim() {
            "" => "upload".to_string(),
            name => name.to_string(),
        };
        Ok(Self {
            id: Uuid::new_v4(),
            bytes,
            mime,
            file_name,
            captured_at: Utc::now(),
            origin: CaptureOrigin::Upload,
            pixels: Arc::new(pixels),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn origin(&self) -> CaptureOrigin {
        self.origin
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Stable reference stored with reports in place of the bytes.
    pub fn reference(&self) -> String {
        format!("capture://{}", self.id)
    }
}

/// Holds at most one artifact: the one the result screen is showing.
#[derive(Debug, Default)]
pub struct CaptureSlot {
    current: Mutex<Option<StoredCapture>>,
}

/// A capture together with the final result produced for it.
#[derive(Debug, Clone)]
pub struct StoredCapture {
    pub artifact: CaptureArtifact,
    pub result: InferenceResult,
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `artifact` and its result, releasing whatever was there.
    pub fn replace(&self, artifact: CaptureArtifact, result: InferenceResult) -> Uuid {
        let id = artifact.id();
        if let Some(previous) = self.lock().replace(StoredCapture { artifact, result }) {
            release(previous.artifact, "superseded");
        }
        id
    }

    /// Put back a capture the report flow could not hand off, unless a newer
    /// one already took its place.
    pub fn restore(&self, stored: StoredCapture) -> bool {
        let mut current = self.lock();
        if current.is_some() {
            release(stored.artifact, "stale");
            return false;
        }
        *current = Some(stored);
        true
    }

    /// Hand the capture to the report flow.
    pub fn take(&self) -> Option<StoredCapture> {
        let stored = self.lock().take();
        if let Some(s) = &stored {
            tracing::debug!(id = %s.artifact.id(), "Capture artifact taken for report");
        }
        stored
    }

    /// Drop the current artifact (user chose "scan again").
    pub fn discard(&self) {
        if let Some(previous) = self.lock().take() {
            release(previous.artifact, "discarded");
        }
    }

    pub fn current_id(&self) -> Option<Uuid> {
        self.lock().as_ref().map(|s| s.artifact.id())
    }

    /// Final result of the stored capture.
    pub fn current_result(&self) -> Option<InferenceResult> {
        self.lock().as_ref().map(|s| s.result.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StoredCapture>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn release(artifact: CaptureArtifact, reason: &'static str) {
    tracing::debug!(
        id = %artifact.id(),
        origin = ?artifact.origin(),
        bytes = artifact.bytes().len(),
        reason,
        "Capture artifact released"
    );
}
