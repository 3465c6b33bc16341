//! Camera access with scoped acquisition.
//!
//! A `CameraStream` holds the camera exclusively from `open` until it is
//! closed or dropped, whichever comes first. Frames are published through a
//! `watch` channel: the stream reads the most recent one and `ready()`
//! resolves once the first frame exists.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use super::types::{Facing, FrameSource, FrameState, PixelBuffer};
use super::FrameError;
use crate::pipeline::capture::CaptureArtifact;

type LatestFrame = Option<Arc<PixelBuffer>>;
type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// Opens camera streams. The embedding host provides the real device.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, facing: Facing) -> Result<CameraStream, FrameError>;
}

/// An open camera. Releases the device on `close()` or drop.
pub struct CameraStream {
    facing: Facing,
    frames: watch::Receiver<LatestFrame>,
    release: Mutex<Option<ReleaseFn>>,
    closed: AtomicBool,
}

impl fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraStream")
            .field("facing", &self.facing)
            .field("has_frame", &self.frames.borrow().is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CameraStream {
    /// Wrap a frame channel; `release` runs exactly once when the stream closes.
    pub fn new(
        facing: Facing,
        frames: watch::Receiver<LatestFrame>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            facing,
            frames,
            release: Mutex::new(Some(Box::new(release))),
            closed: AtomicBool::new(false),
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Resolves once the stream has produced its first decodable frame.
    pub async fn ready(&self) -> Result<(), FrameError> {
        let mut rx = self.frames.clone();
        rx.wait_for(|frame| frame.is_some())
            .await
            .map(|_| ())
            .map_err(|_| FrameError::FeedClosed)
    }

    /// Most recent frame, if any.
    pub fn snapshot(&self) -> Option<Arc<PixelBuffer>> {
        if self.is_closed() {
            return None;
        }
        self.frames.borrow().clone()
    }

    /// Encode the current frame as a JPEG still.
    pub fn capture_still(&self) -> Result<CaptureArtifact, FrameError> {
        let frame = self.snapshot().ok_or(FrameError::NoFrame)?;
        CaptureArtifact::from_camera_frame(frame)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the camera. Safe to call more than once.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let release = match self.release.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(release) = release {
            release();
            tracing::debug!(facing = %self.facing, "Camera stream released");
        }
    }
}

impl FrameSource for CameraStream {
    fn current_frame(&self) -> FrameState {
        match self.snapshot() {
            Some(frame) => FrameState::Ready(frame),
            None => FrameState::Pending,
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ═══════════════════════════════════════════════════════════
// PushCamera
// ═══════════════════════════════════════════════════════════

/// Camera whose frames are pushed in by the host through a `FrameFeeder`.
///
/// Models the browser camera contract: permission, which facings exist,
/// and exclusive use of the hardware.
pub struct PushCamera {
    facings: Vec<Facing>,
    permission_granted: AtomicBool,
    in_use: Arc<AtomicBool>,
    frames: Arc<watch::Sender<LatestFrame>>,
}

/// Host-side handle that publishes frames to whichever stream is open.
#[derive(Clone)]
pub struct FrameFeeder {
    frames: Arc<watch::Sender<LatestFrame>>,
}

impl FrameFeeder {
    /// Publish a new frame; it replaces the previous one.
    pub fn push(&self, frame: PixelBuffer) {
        self.frames.send_replace(Some(Arc::new(frame)));
    }
}

impl PushCamera {
    pub fn new(facings: &[Facing]) -> (Self, FrameFeeder) {
        let (tx, _rx) = watch::channel(None);
        let frames = Arc::new(tx);
        let camera = Self {
            facings: facings.to_vec(),
            permission_granted: AtomicBool::new(true),
            in_use: Arc::new(AtomicBool::new(false)),
            frames: frames.clone(),
        };
        (camera, FrameFeeder { frames })
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::Release);
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

#[async_trait]
impl CameraDevice for PushCamera {
    async fn open(&self, facing: Facing) -> Result<CameraStream, FrameError> {
        if !self.permission_granted.load(Ordering::Acquire) {
            return Err(FrameError::PermissionDenied);
        }
        if !self.facings.contains(&facing) {
            return Err(FrameError::NoCamera(facing));
        }
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(FrameError::Busy);
        }

        // A new session starts without frames, like a video element before metadata loads.
        self.frames.send_replace(None);

        let in_use = self.in_use.clone();
        tracing::debug!(%facing, "Camera stream opened");
        Ok(CameraStream::new(facing, self.frames.subscribe(), move || {
            in_use.store(false, Ordering::Release);
        }))
    }
}
