//! Scan-page application state.
//!
//! `CoreState` is the single shared object an embedding host drives: it owns
//! the screening engine, the expert client, the camera mode (stream plus live
//! loop) and the capture slot, and exposes the scan page's operations.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::collaborators::{
    DiseaseCatalog, DiseaseInfo, GeoPoint, ReportError, ReportId, ReportSink, ScanReport,
};
use crate::config::{ConfigError, ScanConfig};
use crate::model_service::ModelService;
use crate::pipeline::capture::{CaptureArtifact, CaptureSlot};
use crate::pipeline::escalation::{EscalationError, EscalationPolicy};
use crate::pipeline::expert::{ExpertClient, HttpExpertClient};
use crate::pipeline::frame::{CameraDevice, CameraStream, Facing, FrameError};
use crate::pipeline::live::{LatestResult, LiveLoopHandle};
use crate::pipeline::screening::{
    EngineStatus, LabelSet, ModelBackend, ScreeningEngine, ScreeningError,
};
use crate::pipeline::types::InferenceResult;

/// How long a freshly opened camera may take to deliver its first frame.
const CAMERA_READY_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

/// Open camera plus the loop screening it.
struct CameraMode {
    stream: Arc<CameraStream>,
    live_loop: LiveLoopHandle,
}

impl CameraMode {
    fn shutdown(self) {
        self.live_loop.stop();
        self.stream.close();
    }
}

/// Final answer for one capture.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub result: InferenceResult,
    /// Artifact kept in the capture slot for a later report.
    pub artifact_id: Uuid,
}

/// What the farmer submits from the result screen. The diagnosis itself
/// comes from the stored capture.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub user_id: String,
    pub location: Option<GeoPoint>,
}

pub struct CoreState {
    config: ScanConfig,
    engine: Arc<ScreeningEngine>,
    expert: Arc<dyn ExpertClient>,
    policy: EscalationPolicy,
    camera: Arc<dyn CameraDevice>,
    /// Uses tokio Mutex: held across camera open/readiness awaits.
    camera_mode: tokio::sync::Mutex<Option<CameraMode>>,
    live: LatestResult,
    captures: CaptureSlot,
}

impl CoreState {
    pub fn new(
        config: ScanConfig,
        backend: Arc<dyn ModelBackend>,
        expert: Arc<dyn ExpertClient>,
        camera: Arc<dyn CameraDevice>,
    ) -> Result<Self, ScanError> {
        config.validate()?;
        let engine = ScreeningEngine::from_config(&config, backend, Arc::new(ModelService::new()))?;
        let policy = EscalationPolicy::new(engine.labels(), &config.healthy_label)?;
        Ok(Self {
            config,
            engine: Arc::new(engine),
            expert,
            policy,
            camera,
            camera_mode: tokio::sync::Mutex::new(None),
            live: LatestResult::new(),
            captures: CaptureSlot::new(),
        })
    }

    /// Same as `new`, with the HTTP expert client built from `config`.
    pub fn with_http_expert(
        config: ScanConfig,
        backend: Arc<dyn ModelBackend>,
        camera: Arc<dyn CameraDevice>,
    ) -> Result<Self, ScanError> {
        let labels = match &config.labels_path {
            Some(path) => LabelSet::from_file(path)?,
            None => LabelSet::paddy(),
        };
        let expert = HttpExpertClient::from_config(&config, labels)?;
        Self::new(config, backend, Arc::new(expert), camera)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<ScreeningEngine> {
        &self.engine
    }

    /// Running model operation, for the UI's busy indicator.
    pub fn model_service(&self) -> &Arc<ModelService> {
        self.engine.service()
    }

    // ── Model ───────────────────────────────────────────────

    /// Load and warm up the screening model. Safe to call repeatedly.
    pub async fn prepare_model(&self) -> Result<(), ScanError> {
        self.engine.load().await.map_err(ScanError::ModelLoad)
    }

    pub fn model_status(&self) -> watch::Receiver<EngineStatus> {
        self.engine.subscribe()
    }

    // ── Camera mode ─────────────────────────────────────────

    /// Open the camera and start live screening.
    ///
    /// Returns a receiver of the latest live result; `None` means "aiming".
    /// Re-entering replaces the previous camera mode.
    pub async fn enter_camera_mode(
        &self,
        facing: Facing,
    ) -> Result<watch::Receiver<Option<InferenceResult>>, ScanError> {
        if !self.engine.is_ready() {
            return Err(ScanError::ModelUnavailable);
        }

        let mut mode = self.camera_mode.lock().await;
        if let Some(previous) = mode.take() {
            previous.shutdown();
        }
        self.live.clear();

        let stream = Arc::new(self.camera.open(facing).await?);
        match tokio::time::timeout(CAMERA_READY_TIMEOUT, stream.ready()).await {
            Ok(ready) => ready?,
            Err(_) => {
                stream.close();
                return Err(ScanError::Device(FrameError::NoFrame));
            }
        }

        let live_loop = LiveLoopHandle::start(
            stream.clone(),
            self.engine.clone(),
            Arc::new(self.live.clone()),
            self.config.poll_interval(),
        );
        *mode = Some(CameraMode { stream, live_loop });
        info!(%facing, "Camera mode entered");

        Ok(self.live.subscribe())
    }

    /// Stop live screening and release the camera.
    pub async fn exit_camera_mode(&self) {
        if let Some(mode) = self.camera_mode.lock().await.take() {
            mode.shutdown();
            info!("Camera mode exited");
        }
        self.live.clear();
    }

    pub async fn is_camera_mode(&self) -> bool {
        self.camera_mode.lock().await.is_some()
    }

    /// Take a still from the open camera and produce the final result.
    ///
    /// Leaves camera mode whether or not the still could be taken. The
    /// latest live result, when present, stands in for a fresh screening.
    pub async fn capture_from_camera(&self, escalate: bool) -> Result<ScanOutcome, ScanError> {
        let mode = self
            .camera_mode
            .lock()
            .await
            .take()
            .ok_or(ScanError::CaptureNotReady)?;

        mode.live_loop.stop();
        let still = mode.stream.capture_still();
        let screening = self.live.get();
        mode.shutdown();
        self.live.clear();

        let artifact = match still {
            Ok(artifact) => artifact,
            Err(FrameError::NoFrame) => return Err(ScanError::CaptureNotReady),
            Err(e) => return Err(e.into()),
        };
        self.finish_capture(artifact, screening, escalate).await
    }

    // ── Upload ──────────────────────────────────────────────

    /// Screen (and possibly escalate) an uploaded photo.
    pub async fn scan_upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        escalate: bool,
    ) -> Result<ScanOutcome, ScanError> {
        let artifact = CaptureArtifact::from_upload(bytes, file_name)?;
        self.finish_capture(artifact, None, escalate).await
    }

    async fn finish_capture(
        &self,
        artifact: CaptureArtifact,
        screening: Option<InferenceResult>,
        escalate: bool,
    ) -> Result<ScanOutcome, ScanError> {
        let escalate = escalate && self.config.escalation_enabled;
        let span = tracing::info_span!(
            "capture_flow",
            id = %artifact.id(),
            origin = ?artifact.origin(),
            escalate
        );

        let result = self
            .policy
            .resolve(
                &artifact,
                screening,
                escalate,
                self.engine.as_ref(),
                self.expert.as_ref(),
            )
            .instrument(span)
            .await?;

        info!(
            label = %result.label,
            confidence = result.confidence,
            source_model = %result.source_model,
            "Scan complete"
        );
        let artifact_id = self.captures.replace(artifact, result.clone());
        Ok(ScanOutcome {
            result,
            artifact_id,
        })
    }

    // ── Result screen ───────────────────────────────────────

    /// "Scan again": drop the stored still.
    pub fn discard_capture(&self) {
        self.captures.discard();
    }

    pub fn current_capture(&self) -> Option<Uuid> {
        self.captures.current_id()
    }

    /// Submit the current capture and its diagnosis as a report. The capture
    /// leaves the slot on success and is put back if the sink refuses it.
    pub async fn save_report(
        &self,
        sink: &dyn ReportSink,
        request: ReportRequest,
    ) -> Result<ReportId, ScanError> {
        let stored = self.captures.take().ok_or(ScanError::CaptureNotReady)?;
        let report = ScanReport {
            user_id: request.user_id,
            label: stored.result.label.clone(),
            confidence: stored.result.confidence,
            source_model: stored.result.source_model,
            image_ref: stored.artifact.reference(),
            location: request.location,
            created_at: chrono::Utc::now(),
        };

        match sink.save(report).await {
            Ok(id) => Ok(id),
            Err(e) => {
                self.captures.restore(stored);
                Err(ScanError::Report(e))
            }
        }
    }

    pub async fn disease_info(
        &self,
        catalog: &dyn DiseaseCatalog,
        result: &InferenceResult,
    ) -> Option<DiseaseInfo> {
        catalog.lookup(&result.label).await
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from scan operations.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Camera error: {0}")]
    Device(FrameError),
    #[error("Model load error: {0}")]
    ModelLoad(#[from] ScreeningError),
    #[error("Screening model is not ready")]
    ModelUnavailable,
    #[error("Cannot read image: {0}")]
    Decode(FrameError),
    #[error("No diagnosis could be produced")]
    NoResult,
    #[error("No capture available")]
    CaptureNotReady,
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<FrameError> for ScanError {
    fn from(err: FrameError) -> Self {
        if err.is_device_error() {
            ScanError::Device(err)
        } else {
            ScanError::Decode(err)
        }
    }
}

impl From<EscalationError> for ScanError {
    fn from(err: EscalationError) -> Self {
        match err {
            EscalationError::NoResult => ScanError::NoResult,
        }
    }
}

impl ScanError {
    /// Camera, model-load and image-read failures are shown to the farmer;
    /// everything else is absorbed by the UI.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Device(_) | Self::ModelLoad(_) | Self::Decode(_)
        )
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryDiseaseCatalog, InMemoryReportStore};
    use crate::pipeline::frame::{FrameFeeder, PushCamera};
    use crate::pipeline::test_support::{
        gradient_frame, paddy_scores, png_bytes, StubBackend, StubExpert, StubModelBehavior,
    };
    use crate::pipeline::types::SourceModel;

    const BLAST: usize = 3;
    const NORMAL: usize = 8;

    struct Harness {
        state: CoreState,
        backend: Arc<StubBackend>,
        expert: Arc<StubExpert>,
        camera: Arc<PushCamera>,
        feeder: FrameFeeder,
    }

    fn harness(behavior: StubModelBehavior, expert: StubExpert) -> Harness {
        let config = ScanConfig {
            target_size: 8,
            poll_interval_ms: 10,
            ..ScanConfig::default()
        };
        let backend = Arc::new(StubBackend::new(behavior));
        let expert = Arc::new(expert);
        let (camera, feeder) = PushCamera::new(&[Facing::Environment]);
        let camera = Arc::new(camera);
        let state = CoreState::new(config, backend.clone(), expert.clone(), camera.clone()).unwrap();
        Harness {
            state,
            backend,
            expert,
            camera,
            feeder,
        }
    }

    /// Keep pushing frames until the returned handle is aborted.
    fn keep_feeding(feeder: FrameFeeder) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                feeder.push(gradient_frame(12, 9));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    }

    async fn wait_for_live(rx: &mut watch::Receiver<Option<InferenceResult>>) -> InferenceResult {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|r| r.is_some()))
            .await
            .expect("live result in time")
            .unwrap()
            .clone()
            .unwrap()
    }

    #[tokio::test]
    async fn camera_mode_requires_ready_model() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        let err = h.state.enter_camera_mode(Facing::Environment).await.unwrap_err();
        assert!(matches!(err, ScanError::ModelUnavailable));
        assert!(!err.is_user_facing());
        assert!(!h.camera.is_in_use());
    }

    #[tokio::test]
    async fn failed_model_load_is_user_facing() {
        let h = harness(StubModelBehavior::FailLoad, StubExpert::unavailable());
        let err = h.state.prepare_model().await.unwrap_err();
        assert!(matches!(err, ScanError::ModelLoad(_)));
        assert!(err.is_user_facing());
        assert!(matches!(
            *h.state.model_status().borrow(),
            EngineStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn camera_permission_denied_is_user_facing() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        h.camera.set_permission(false);
        let err = h.state.enter_camera_mode(Facing::Environment).await.unwrap_err();
        assert!(matches!(err, ScanError::Device(FrameError::PermissionDenied)));
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn live_results_flow_then_capture_escalates() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::answering("blast", 0.97),
        );
        h.state.prepare_model().await.unwrap();
        let feeding = keep_feeding(h.feeder.clone());

        let mut rx = h.state.enter_camera_mode(Facing::Environment).await.unwrap();
        let live = wait_for_live(&mut rx).await;
        assert_eq!(live.label.as_str(), "blast");
        assert_eq!(live.source_model, SourceModel::Screening);
        assert!(h.camera.is_in_use());

        let outcome = h.state.capture_from_camera(true).await.unwrap();
        feeding.abort();

        assert_eq!(outcome.result.source_model, SourceModel::ExpertServer);
        assert_eq!(h.expert.calls(), 1);
        assert!(!h.camera.is_in_use());
        assert!(!h.state.is_camera_mode().await);
        assert!(rx.borrow().is_none());
        assert_eq!(h.state.current_capture(), Some(outcome.artifact_id));
    }

    #[tokio::test]
    async fn capture_without_camera_mode_is_not_ready() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        let err = h.state.capture_from_camera(true).await.unwrap_err();
        assert!(matches!(err, ScanError::CaptureNotReady));
    }

    #[tokio::test]
    async fn exit_camera_mode_releases_camera() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        let feeding = keep_feeding(h.feeder.clone());

        let mut rx = h.state.enter_camera_mode(Facing::Environment).await.unwrap();
        wait_for_live(&mut rx).await;
        h.state.exit_camera_mode().await;
        feeding.abort();

        assert!(!h.camera.is_in_use());
        assert!(rx.borrow().is_none());

        // Releasing the camera lets it be opened again.
        let feeding = keep_feeding(h.feeder.clone());
        h.state.enter_camera_mode(Facing::Environment).await.unwrap();
        h.state.exit_camera_mode().await;
        feeding.abort();
    }

    #[tokio::test]
    async fn reentering_camera_mode_replaces_previous() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        let feeding = keep_feeding(h.feeder.clone());

        h.state.enter_camera_mode(Facing::Environment).await.unwrap();
        h.state.enter_camera_mode(Facing::Environment).await.unwrap();
        assert!(h.camera.is_in_use());

        h.state.exit_camera_mode().await;
        feeding.abort();
        assert!(!h.camera.is_in_use());
    }

    #[tokio::test]
    async fn healthy_upload_skips_expert() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::answering("blast", 0.9),
        );
        h.state.prepare_model().await.unwrap();

        let outcome = h
            .state
            .scan_upload(png_bytes(20, 20, [40, 180, 60]), "leaf.png", true)
            .await
            .unwrap();
        assert_eq!(outcome.result.label.as_str(), "normal");
        assert_eq!(outcome.result.source_model, SourceModel::Screening);
        assert_eq!(h.expert.calls(), 0);
    }

    #[tokio::test]
    async fn diseased_upload_falls_back_when_expert_down() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();

        let outcome = h
            .state
            .scan_upload(png_bytes(20, 20, [120, 90, 30]), "leaf.png", true)
            .await
            .unwrap();
        assert_eq!(outcome.result.label.as_str(), "blast");
        assert_eq!(outcome.result.source_model, SourceModel::ExpertLocalFallback);
        assert_eq!(h.expert.calls(), 1);
        // Warm-up, screening, fallback re-run.
        assert_eq!(h.backend.run_count(), 3);
    }

    #[tokio::test]
    async fn config_can_disable_escalation() {
        let config = ScanConfig {
            target_size: 8,
            escalation_enabled: false,
            ..ScanConfig::default()
        };
        let expert = Arc::new(StubExpert::answering("blast", 0.9));
        let (camera, _feeder) = PushCamera::new(&[Facing::Environment]);
        let state = CoreState::new(
            config,
            Arc::new(StubBackend::new(StubModelBehavior::Scores(paddy_scores(BLAST)))),
            expert.clone(),
            Arc::new(camera),
        )
        .unwrap();
        state.prepare_model().await.unwrap();

        let outcome = state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", true)
            .await
            .unwrap();
        assert_eq!(outcome.result.source_model, SourceModel::Screening);
        assert_eq!(expert.calls(), 0);
    }

    #[tokio::test]
    async fn upload_without_model_goes_to_expert() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::answering("tungro", 0.88),
        );
        let outcome = h
            .state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", true)
            .await
            .unwrap();
        assert_eq!(outcome.result.label.as_str(), "tungro");
        assert_eq!(outcome.result.source_model, SourceModel::ExpertServer);
    }

    #[tokio::test]
    async fn unreadable_upload_is_decode_error() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        let err = h
            .state
            .scan_upload(vec![0u8; 256], "leaf.jpg", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn nothing_available_is_no_result() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        let err = h
            .state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoResult));
        assert!(!err.is_user_facing());
        assert!(h.state.current_capture().is_none());
    }

    #[tokio::test]
    async fn save_report_consumes_capture() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        let outcome = h
            .state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", true)
            .await
            .unwrap();

        let store = InMemoryReportStore::new();
        let request = ReportRequest {
            user_id: "farmer-7".into(),
            location: Some(GeoPoint { lat: -7.25, lng: 112.75 }),
        };
        let id = h.state.save_report(&store, request.clone()).await.unwrap();

        let saved = store.get(id).unwrap();
        assert_eq!(saved.image_ref, format!("capture://{}", outcome.artifact_id));
        assert_eq!(saved.label, outcome.result.label);
        assert_eq!(saved.confidence, outcome.result.confidence);
        assert_eq!(saved.source_model, SourceModel::Screening);
        assert!(h.state.current_capture().is_none());

        let err = h.state.save_report(&store, request).await.unwrap_err();
        assert!(matches!(err, ScanError::CaptureNotReady));
    }

    #[tokio::test]
    async fn rejected_report_keeps_capture() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        let outcome = h
            .state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", false)
            .await
            .unwrap();

        let store = InMemoryReportStore::new();
        let request = ReportRequest {
            user_id: String::new(),
            location: None,
        };
        let err = h.state.save_report(&store, request).await.unwrap_err();
        assert!(matches!(err, ScanError::Report(_)));
        assert_eq!(h.state.current_capture(), Some(outcome.artifact_id));
    }

    #[tokio::test]
    async fn discard_clears_capture() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(NORMAL)),
            StubExpert::unavailable(),
        );
        h.state.prepare_model().await.unwrap();
        h.state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", false)
            .await
            .unwrap();
        h.state.discard_capture();
        assert!(h.state.current_capture().is_none());
    }

    #[tokio::test]
    async fn disease_info_looks_up_result_label() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::unavailable(),
        );
        let catalog = InMemoryDiseaseCatalog::from_json(
            r#"[{"id":"blast","name":"Blas","description":"d","cause":"c"}]"#,
        )
        .unwrap();
        let result = crate::pipeline::test_support::screening_result("blast", 0.8);
        let info = h.state.disease_info(&catalog, &result).await.unwrap();
        assert_eq!(info.name, "Blas");
    }

    #[tokio::test]
    async fn report_carries_escalated_result_of_capture() {
        let h = harness(
            StubModelBehavior::Scores(paddy_scores(BLAST)),
            StubExpert::answering("hispa", 0.93),
        );
        h.state.prepare_model().await.unwrap();
        let outcome = h
            .state
            .scan_upload(png_bytes(10, 10, [1, 2, 3]), "leaf.png", true)
            .await
            .unwrap();
        assert_eq!(outcome.result.label.as_str(), "hispa");

        let store = InMemoryReportStore::new();
        let request = ReportRequest {
            user_id: "farmer-7".into(),
            location: None,
        };
        let saved = store
            .get(h.state.save_report(&store, request).await.unwrap())
            .unwrap();
        assert_eq!(saved.label.as_str(), "hispa");
        assert_eq!(saved.source_model, SourceModel::ExpertServer);
        assert!((saved.confidence - 0.93).abs() < 1e-6);
    }

    #[test]
    fn zero_poll_interval_rejected_at_construction() {
        let config = ScanConfig {
            poll_interval_ms: 0,
            ..ScanConfig::default()
        };
        let (camera, _feeder) = PushCamera::new(&[Facing::Environment]);
        let result = CoreState::new(
            config,
            Arc::new(StubBackend::new(StubModelBehavior::Scores(paddy_scores(BLAST)))),
            Arc::new(StubExpert::unavailable()),
            Arc::new(camera),
        );
        assert!(matches!(
            result,
            Err(ScanError::Config(ConfigError::InvalidValue {
                key: "poll_interval_ms",
                ..
            }))
        ));
    }

    #[test]
    fn unknown_healthy_label_rejected_at_construction() {
        let config = ScanConfig {
            healthy_label: "sehat".into(),
            ..ScanConfig::default()
        };
        let (camera, _feeder) = PushCamera::new(&[Facing::Environment]);
        let result = CoreState::new(
            config,
            Arc::new(StubBackend::new(StubModelBehavior::FailLoad)),
            Arc::new(StubExpert::unavailable()),
            Arc::new(camera),
        );
        assert!(matches!(result, Err(ScanError::ModelLoad(ScreeningError::Labels(_)))));
    }
}
