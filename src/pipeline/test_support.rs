//! Shared fixtures and test doubles for pipeline tests.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::model_service::{ModelService, OperationKind};
use crate::pipeline::capture::CaptureArtifact;
use crate::pipeline::expert::{ExpertClient, RemoteUnavailable};
use crate::pipeline::frame::{PixelBuffer, PixelFormat};
use crate::pipeline::live::ResultObserver;
use crate::pipeline::preprocess::{InputTensor, Normalization, Preprocessor, ResizeMode};
use crate::pipeline::screening::{
    FramePredictor, LabelSet, LoadedModel, ModelBackend, ModelSpec, ScreeningEngine,
    ScreeningError,
};
use crate::pipeline::types::{InferenceResult, Label, SourceModel};

// ── Images ──────────────────────────────────────────────────

pub fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> PixelBuffer {
    PixelBuffer::from_rgb_image(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

/// Every pixel distinct enough to catch sampling mistakes.
pub fn gradient_frame(width: u32, height: u32) -> PixelBuffer {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 7 % 256) as u8);
            data.push((y * 11 % 256) as u8);
            data.push(((x + y) * 3 % 256) as u8);
        }
    }
    PixelBuffer::new(width, height, PixelFormat::Rgb8, data).unwrap()
}

pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn camera_artifact() -> CaptureArtifact {
    CaptureArtifact::from_camera_frame(Arc::new(gradient_frame(16, 16))).unwrap()
}

// ── Results ─────────────────────────────────────────────────

/// Ten paddy scores with `top` clearly winning.
pub fn paddy_scores(top: usize) -> Vec<f32> {
    (0..10).map(|i| if i == top { 0.9 } else { 0.01 }).collect()
}

pub fn screening_result(label: &str, confidence: f32) -> InferenceResult {
    InferenceResult::new(Label::new(label), confidence, SourceModel::Screening)
}

// ── Model backend ───────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum StubModelBehavior {
    Scores(Vec<f32>),
    FailLoad,
    FailRun,
}

#[derive(Default)]
struct StubCounters {
    loads: AtomicUsize,
    runs: AtomicUsize,
    fail_runs: AtomicBool,
    last_input: Mutex<Option<String>>,
    last_spec: Mutex<Option<ModelSpec>>,
    run_delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Backend whose model returns fixed scores and counts every call.
pub struct StubBackend {
    behavior: StubModelBehavior,
    load_delay: Mutex<Duration>,
    counters: Arc<StubCounters>,
}

impl StubBackend {
    pub fn new(behavior: StubModelBehavior) -> Self {
        Self {
            behavior,
            load_delay: Mutex::new(Duration::ZERO),
            counters: Arc::new(StubCounters::default()),
        }
    }

    pub fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.lock().unwrap() = delay;
    }

    /// Each forward pass sleeps this long on the calling (blocking) thread.
    pub fn set_run_delay(&self, delay: Duration) {
        self.counters
            .run_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_runs(&self, fail: bool) {
        self.counters.fail_runs.store(fail, Ordering::SeqCst);
    }

    pub fn load_count(&self) -> usize {
        self.counters.loads.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }

    pub fn last_input_name(&self) -> Option<String> {
        self.counters.last_input.lock().unwrap().clone()
    }

    pub fn loaded_spec(&self) -> Option<ModelSpec> {
        self.counters.last_spec.lock().unwrap().clone()
    }

    /// Most forward passes ever observed running at the same time.
    pub fn max_concurrent_runs(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ModelBackend for StubBackend {
    fn load(&self, spec: &ModelSpec) -> Result<Box<dyn LoadedModel>, ScreeningError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_spec.lock().unwrap() = Some(spec.clone());
        let delay = *self.load_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let scores = match &self.behavior {
            StubModelBehavior::FailLoad => {
                return Err(ScreeningError::ModelInit("stub load failure".into()))
            }
            StubModelBehavior::FailRun => None,
            StubModelBehavior::Scores(scores) => Some(scores.clone()),
        };
        Ok(Box::new(StubModel {
            scores,
            spec: spec.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct StubModel {
    scores: Option<Vec<f32>>,
    spec: ModelSpec,
    counters: Arc<StubCounters>,
}

impl LoadedModel for StubModel {
    fn run(&mut self, input_name: &str, tensor: &InputTensor) -> Result<Vec<f32>, ScreeningError> {
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        *self.counters.last_input.lock().unwrap() = Some(input_name.to_string());
        self.spec.check_input(tensor)?;

        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay_ms = self.counters.run_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.scores {
            Some(scores) if !self.counters.fail_runs.load(Ordering::SeqCst) => Ok(scores.clone()),
            _ => Err(ScreeningError::Inference("stub run failure".into())),
        }
    }
}

/// Engine over the paddy label set with an 8x8 input and a stub backend.
pub fn stub_engine(behavior: StubModelBehavior) -> (ScreeningEngine, Arc<StubBackend>) {
    let backend = Arc::new(StubBackend::new(behavior));
    let preprocessor = Preprocessor::new(8, ResizeMode::CenterCrop, Normalization::Unit).unwrap();
    let engine = ScreeningEngine::new(
        backend.clone(),
        Arc::new(ModelService::new()),
        preprocessor,
        LabelSet::paddy(),
        Path::new("stub/model.onnx"),
        "input_1",
    );
    (engine, backend)
}

// ── Predictor ───────────────────────────────────────────────

/// `FramePredictor` with a fixed answer, optional latency and call accounting.
#[derive(Default)]
pub struct StubPredictor {
    answer: Option<(String, f32)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubPredictor {
    pub fn answering(label: &str, confidence: f32) -> Self {
        Self {
            answer: Some((label.to_string(), confidence)),
            ..Self::default()
        }
    }

    /// Always returns `None`, like an engine that is not ready.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FramePredictor for StubPredictor {
    async fn predict(&self, _frame: &PixelBuffer, _kind: OperationKind) -> Option<InferenceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.answer
            .as_ref()
            .map(|(label, confidence)| screening_result(label, *confidence))
    }
}

// ── Expert ──────────────────────────────────────────────────

/// Expert double answering with a fixed label, or always unavailable.
pub struct StubExpert {
    answer: Option<(String, f32)>,
    calls: AtomicUsize,
}

impl StubExpert {
    pub fn answering(label: &str, confidence: f32) -> Self {
        Self {
            answer: Some((label.to_string(), confidence)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExpertClient for StubExpert {
    async fn predict_expert(
        &self,
        _artifact: &CaptureArtifact,
    ) -> Result<InferenceResult, RemoteUnavailable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Some((label, confidence)) => Ok(InferenceResult::new(
                Label::new(label.as_str()),
                *confidence,
                SourceModel::ExpertServer,
            )),
            None => Err(RemoteUnavailable::Connection("stub expert offline".into())),
        }
    }
}

// ── Observer ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingObserver {
    results: Mutex<Vec<InferenceResult>>,
}

impl RecordingObserver {
    pub fn count(&self) -> usize {
        self.results.lock().unwrap().len()
    }
}

impl ResultObserver for RecordingObserver {
    fn publish(&self, result: InferenceResult) {
        self.results.lock().unwrap().push(result);
    }
}
