mod schedule;

pub use schedule::{DisplayClock, FrameTask, RefreshClock};

use crate::capture::{
    list_camera_options, CameraBackend, CameraDevice, CaptureError, CaptureSession, FacingMode,
};
use crate::classifier::{ImageClassifier, ModelError, ModelLoader, ModelSource, PredictionSet};
use crate::presentation::PredictionSink;
use crate::render::{RenderTargetSelector, SurfaceContainer};
use anyhow::{bail, Context, Result};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Why a Start left the loop idle
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Everything that lives exactly as long as one Start..Stop span
struct ActiveSession {
    classifier: Box<dyn ImageClassifier>,
    task: FrameTask,
    stats: CycleStats,
}

/// Rolling timings, logged every `STATS_INTERVAL` cycles
#[derive(Default)]
struct CycleStats {
    cycles: u64,
    capture_time: Duration,
    predict_time: Duration,
}

const STATS_INTERVAL: u64 = 30;

impl CycleStats {
    fn record(&mut self, capture: Duration, predict: Duration) {
        self.cycles += 1;
        self.capture_time += capture;
        self.predict_time += predict;

        if self.cycles % STATS_INTERVAL == 0 {
            let n = self.cycles as f64;
            let avg_capture_ms = self.capture_time.as_secs_f64() * 1000.0 / n;
            let avg_predict_ms = self.predict_time.as_secs_f64() * 1000.0 / n;
            let total_ms = avg_capture_ms + avg_predict_ms;
            tracing::info!(
                "Cycle {}: capture={:.1}ms, predict={:.1}ms, total={:.1}ms, max_fps={:.1}",
                self.cycles,
                avg_capture_ms,
                avg_predict_ms,
                total_ms,
                1000.0 / total_ms.max(f64::EPSILON)
            );
        }
    }
}

/// Capture-and-classify loop driven by Start/Stop
///
/// Owns the camera backend, the model loader and the render container; at
/// most one session exists at a time.
pub struct InferenceLoop {
    backend: Box<dyn CameraBackend>,
    loader: Box<dyn ModelLoader>,
    source: ModelSource,
    selector: RenderTargetSelector,
    container: SurfaceContainer,
    sink: Box<dyn PredictionSink>,
    capture: CaptureSession,
    preference: FacingMode,
    mirrored: bool,
    permission_granted: bool,
    camera_options: Vec<CameraDevice>,
    active: Option<ActiveSession>,
    next_task_id: u64,
}

impl InferenceLoop {
    pub fn new(
        backend: Box<dyn CameraBackend>,
        loader: Box<dyn ModelLoader>,
        source: ModelSource,
        selector: RenderTargetSelector,
        sink: Box<dyn PredictionSink>,
    ) -> Self {
        Self {
            backend,
            loader,
            source,
            selector,
            container: SurfaceContainer::new(),
            sink,
            capture: CaptureSession::stopped(FacingMode::default()),
            preference: FacingMode::default(),
            mirrored: true,
            permission_granted: false,
            camera_options: Vec::new(),
            active: None,
            next_task_id: 0,
        }
    }

    pub fn with_preference(mut self, preference: FacingMode) -> Self {
        self.preference = preference;
        self
    }

    /// Whether frames are shown flipped (selfie view)
    pub fn with_mirrored(mut self, mirrored: bool) -> Self {
        self.mirrored = mirrored;
        self
    }

    pub fn state(&self) -> LoopState {
        if self.active.is_some() && self.capture.is_active() {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    #[cfg(test)]
    pub fn preference(&self) -> FacingMode {
        self.preference
    }

    /// Change the requested camera; takes effect on the next Start
    pub fn set_preference(&mut self, preference: FacingMode) {
        tracing::info!("Camera preference set to {:?}", preference);
        self.preference = preference;
    }

    /// Select a camera from the option list by its label
    pub fn select_camera(&mut self, label: &str) {
        self.set_preference(FacingMode::from_label(label));
    }

    pub fn permission_granted(&self) -> bool {
        self.permission_granted
    }

    pub fn camera_options(&self) -> &[CameraDevice] {
        &self.camera_options
    }

    /// Re-query the device list; only meaningful after permission was granted
    pub fn refresh_camera_options(&mut self) {
        if !self.permission_granted {
            tracing::info!("Camera options are available after the first Start");
            return;
        }
        self.camera_options = list_camera_options(self.backend.as_ref());
        self.sink.show_camera_options(&self.camera_options);
    }

    #[cfg(test)]
    pub fn container(&self) -> &SurfaceContainer {
        &self.container
    }

    /// Total classes of the loaded model, while running
    #[cfg(test)]
    pub fn total_classes(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.classifier.total_classes())
    }

    /// Handle to the scheduled frame task, while running
    #[cfg(test)]
    pub fn frame_task(&self) -> Option<FrameTask> {
        self.active.as_ref().map(|a| a.task.clone())
    }

    /// Cycles completed by the current session
    #[cfg(test)]
    pub fn cycles(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.stats.cycles)
    }

    /// Idle -> Running. A running loop is stopped first.
    ///
    /// Any failure leaves the loop idle with no stream held.
    pub fn start(&mut self) -> Result<(), StartError> {
        self.stop();

        let classifier = self.loader.load(&self.source)?;
        tracing::info!("Classifier ready with {} classes", classifier.total_classes());

        self.capture.restart(
            self.backend.as_ref(),
            self.preference,
            &self.selector,
            &mut self.container,
        )?;

        self.permission_granted = true;
        self.refresh_camera_options();

        let task = FrameTask::new(self.next_task_id);
        self.next_task_id += 1;
        tracing::info!(
            "Inference loop running on {} ({:?}, task {}, {:?} surface)",
            self.capture.device().map_or("unknown camera", |d| d.label.as_str()),
            self.capture.preference(),
            task.id(),
            self.selector.surface_kind()
        );

        self.active = Some(ActiveSession {
            classifier,
            task,
            stats: CycleStats::default(),
        });
        Ok(())
    }

    /// Running -> Idle. Calling it while idle does nothing.
    pub fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.task.cancel();
        self.capture.stop(&mut self.container);
        self.sink.clear();
        tracing::info!("Inference loop stopped");
    }

    /// Run one cycle if a session is scheduled.
    ///
    /// Returns `Ok(false)` when idle. A cancelled task ends the session the
    /// same way Stop does. A failing cycle stops the loop and returns the
    /// error.
    pub fn tick(&mut self) -> Result<bool> {
        let Some(active) = self.active.as_mut() else {
            return Ok(false);
        };
        if active.task.is_cancelled() {
            tracing::info!("Frame task {} cancelled", active.task.id());
            self.stop();
            return Ok(false);
        }

        match run_cycle(active, &mut self.capture, &mut self.container, self.mirrored) {
            Ok(predictions) => {
                self.sink.show_predictions(&predictions);
                Ok(true)
            }
            Err(err) => {
                tracing::error!("Inference cycle failed: {:#}", err);
                self.stop();
                Err(err)
            }
        }
    }
}

/// Refresh the frame, classify it, and check the result
fn run_cycle(
    active: &mut ActiveSession,
    capture: &mut CaptureSession,
    container: &mut SurfaceContainer,
    mirrored: bool,
) -> Result<PredictionSet> {
    let _span = tracing::debug_span!("cycle", task = active.task.id()).entered();

    let capture_start = Instant::now();
    capture
        .update(container)
        .context("Failed to capture frame")?;
    let capture_time = capture_start.elapsed();

    let frame = container
        .surface()
        .and_then(|surface| surface.frame())
        .context("Render surface has no frame")?;

    let predict_start = Instant::now();
    let predictions = active
        .classifier
        .predict(frame, mirrored)
        .context("Failed to classify frame")?;
    let predict_time = predict_start.elapsed();

    let expected = active.classifier.total_classes();
    if predictions.len() != expected {
        bail!(
            "Classifier returned {} predictions for {} classes",
            predictions.len(),
            expected
        );
    }

    active.stats.record(capture_time, predict_time);
    Ok(predictions)
}
