//! Live polling loop: screens the camera feed at a fixed cadence while the
//! camera is open.
//!
//! **Guarantees**:
//! - at most one predict in flight; a tick that lands while one runs is
//!   dropped, not queued
//! - a `Pending` frame skips the tick
//! - once `stop()` returns (or the handle drops) the observer is never
//!   notified again, even if an in-flight predict resolves later

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::model_service::OperationKind;
use crate::pipeline::frame::{FrameSource, FrameState};
use crate::pipeline::screening::FramePredictor;
use crate::pipeline::types::InferenceResult;

/// Receives each completed live result. Last write wins.
pub trait ResultObserver: Send + Sync {
    fn publish(&self, result: InferenceResult);
}

/// `watch`-backed slot holding the newest live result.
#[derive(Clone)]
pub struct LatestResult {
    tx: Arc<watch::Sender<Option<InferenceResult>>>,
}

impl LatestResult {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<InferenceResult>> {
        self.tx.subscribe()
    }

    pub fn get(&self) -> Option<InferenceResult> {
        self.tx.borrow().clone()
    }

    /// Back to "aiming" (no result yet).
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

impl Default for LatestResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultObserver for LatestResult {
    fn publish(&self, result: InferenceResult) {
        self.tx.send_replace(Some(result));
    }
}

// ═══════════════════════════════════════════════════════════
// Loop
// ═══════════════════════════════════════════════════════════

struct LoopShared {
    busy: AtomicBool,
    /// `true` once stopped. Publication happens under this lock.
    stopped: Mutex<bool>,
    observer: Arc<dyn ResultObserver>,
}

impl LoopShared {
    fn is_stopped(&self) -> bool {
        match self.stopped.lock() {
            Ok(stopped) => *stopped,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn finish(&self, result: Option<InferenceResult>) {
        if let Some(result) = result {
            let stopped = match self.stopped.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *stopped {
                debug!("Live result discarded, loop already stopped");
            } else {
                self.observer.publish(result);
            }
        }
        self.busy.store(false, Ordering::Release);
    }
}

/// Handle to a running live loop. Dropping it stops the loop.
pub struct LiveLoopHandle {
    shared: Arc<LoopShared>,
    ticker: JoinHandle<()>,
}

impl LiveLoopHandle {
    /// Start polling `source` every `interval`.
    pub fn start(
        source: Arc<dyn FrameSource>,
        predictor: Arc<dyn FramePredictor>,
        observer: Arc<dyn ResultObserver>,
        interval: Duration,
    ) -> Self {
        let shared = Arc::new(LoopShared {
            busy: AtomicBool::new(false),
            stopped: Mutex::new(false),
            observer,
        });

        let ticker = tokio::spawn(run_ticker(shared.clone(), source, predictor, interval));
        info!(interval_ms = interval.as_millis() as u64, "Live loop started");

        Self { shared, ticker }
    }

    /// Stop the loop. No notification is delivered after this returns.
    pub fn stop(&self) {
        {
            let mut stopped = match self.shared.stopped.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *stopped {
                return;
            }
            *stopped = true;
        }
        self.ticker.abort();
        info!("Live loop stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.shared.is_stopped()
    }

    /// A predict is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }
}

impl Drop for LiveLoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker(
    shared: Arc<LoopShared>,
    source: Arc<dyn FrameSource>,
    predictor: Arc<dyn FramePredictor>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if shared.is_stopped() {
            break;
        }

        if shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Predict in flight, tick dropped");
            continue;
        }

        let frame = match source.current_frame() {
            FrameState::Ready(frame) => frame,
            FrameState::Pending => {
                shared.busy.store(false, Ordering::Release);
                trace!("Frame not ready, tick skipped");
                continue;
            }
        };

        let shared = shared.clone();
        let predictor = predictor.clone();
        tokio::spawn(async move {
            let result = predictor.predict(&frame, OperationKind::LiveFrame).await;
            shared.finish(result);
        });
    }
}
