//! Model service: single point of access to the loaded screening model.
//!
//! **Why this exists**: the live loop and capture flows share one model
//! handle. Running two forward passes at once would contend for the same
//! session, so every execution goes through this service's lock and the
//! running operation is tracked for observability.
//!
//! **Design**:
//! - `ModelService` is shared via `Arc` between the engine and anything that
//!   wants to observe it
//! - `acquire()` blocks until the model is free
//! - `run()` executes one forward pass on the blocking pool
//! - `current_operation()` reports what runs, on which model, since when

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::pipeline::preprocess::InputTensor;
use crate::pipeline::screening::{LoadedModel, ScreeningError};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Why the model is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// One-off zero-tensor pass right after load
    WarmUp,
    /// Polling tick while the camera is open
    LiveFrame,
    /// Still image from the camera shutter or an upload
    Capture,
    /// Re-run after the expert model was unreachable
    FallbackRerun,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WarmUp => write!(f, "Warm-up"),
            Self::LiveFrame => write!(f, "Live frame"),
            Self::Capture => write!(f, "Capture"),
            Self::FallbackRerun => write!(f, "Fallback re-run"),
        }
    }
}

/// Snapshot of the currently running model operation.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub kind: OperationKind,
    /// Model artifact in use.
    pub model: String,
    /// When the operation started (ISO 8601).
    pub started_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelServiceError {
    #[error("Internal lock error")]
    LockPoisoned,

    #[error("No model installed")]
    NotInstalled,

    #[error("Model task failed: {0}")]
    Join(String),
}

impl From<ModelServiceError> for ScreeningError {
    fn from(err: ModelServiceError) -> Self {
        ScreeningError::Inference(err.to_string())
    }
}

struct Installed {
    model: Box<dyn LoadedModel>,
    path: PathBuf,
}

// ═══════════════════════════════════════════════════════════
// ModelService
// ═══════════════════════════════════════════════════════════

/// Exclusive access controller around the shared model handle.
///
/// The handle is installed once after load and never removed.
pub struct ModelService {
    slot: Mutex<Option<Installed>>,
    current_op: Mutex<Option<ActiveOperation>>,
}

impl ModelService {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            current_op: Mutex::new(None),
        }
    }

    /// Install the loaded model. A second install is ignored.
    pub fn install(&self, model: Box<dyn LoadedModel>, path: &Path) -> Result<(), ModelServiceError> {
        let mut slot = self.slot.lock().map_err(|_| ModelServiceError::LockPoisoned)?;
        if slot.is_some() {
            tracing::warn!(path = %path.display(), "Model already installed, keeping the first");
            return Ok(());
        }
        *slot = Some(Installed {
            model,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Acquire exclusive access to the model. Blocks until available.
    ///
    /// Dropping the guard releases the lock and clears the current operation.
    pub fn acquire(&self, kind: OperationKind) -> Result<ModelGuard<'_>, ModelServiceError> {
        let guard = self.slot.lock().map_err(|_| ModelServiceError::LockPoisoned)?;
        self.set_current_op(kind, &guard);
        Ok(ModelGuard {
            guard,
            service: self,
        })
    }

    /// Run one forward pass on the blocking pool.
    ///
    /// The tensor is consumed so its pooled storage is released on the
    /// worker thread as soon as the pass finishes.
    pub async fn run(
        self: &Arc<Self>,
        kind: OperationKind,
        input_name: &str,
        tensor: InputTensor,
    ) -> Result<Vec<f32>, ScreeningError> {
        let service = Arc::clone(self);
        let input_name = input_name.to_string();
        tokio::task::spawn_blocking(move || {
            let mut guard = service.acquire(kind)?;
            let model = guard.model_mut().ok_or(ModelServiceError::NotInstalled)?;
            model.run(&input_name, &tensor)
        })
        .await
        .map_err(|e| ModelServiceError::Join(e.to_string()))?
    }

    /// What operation is currently running? `None` when idle.
    pub fn current_operation(&self) -> Option<ActiveOperation> {
        self.current_op.lock().ok()?.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    // ── Internal ────────────────────────────────────────────

    fn set_current_op(&self, kind: OperationKind, slot: &Option<Installed>) {
        let model = slot
            .as_ref()
            .map(|i| i.path.display().to_string())
            .unwrap_or_default();
        if let Ok(mut current) = self.current_op.lock() {
            *current = Some(ActiveOperation {
                kind,
                model,
                started_at: chrono::Utc::now().to_rfc3339(),
            });
        }
    }

    fn clear_current_op(&self) {
        if let Ok(mut current) = self.current_op.lock() {
            *current = None;
        }
    }
}

impl Default for ModelService {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// ModelGuard: RAII exclusive access token
// ═══════════════════════════════════════════════════════════

/// Exclusive access to the model for the guard's lifetime.
pub struct ModelGuard<'a> {
    guard: MutexGuard<'a, Option<Installed>>,
    service: &'a ModelService,
}

impl ModelGuard<'_> {
    /// The installed model, if load has completed.
    pub fn model_mut(&mut self) -> Option<&mut (dyn LoadedModel + 'static)> {
        self.guard.as_mut().map(|i| i.model.as_mut())
    }
}

impl Drop for ModelGuard<'_> {
    fn drop(&mut self) {
        self.service.clear_current_op();
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
