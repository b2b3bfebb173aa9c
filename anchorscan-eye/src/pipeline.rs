//! Scan pipeline: frames in, marker placements out

use anchorscan_core::{Pose, SurfaceKind};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ResumePolicy, ScanConfig};
use crate::error::ScanError;
use crate::frame::FrameHandle;
use crate::processing::{
    Admission, Completion, DetectionEngine, DetectionOutcome, DetectionResult, DetectionScheduler,
    GeometryReconciler, InFlightSlot, Recognizer, Reconciliation, Rejection, SeenRegistry,
};

const SCENE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of a scanning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Frames keep tracking warm but are never recognized
    Idle,
    /// Onboarding is mapping surfaces
    Coaching,
    /// Frames are offered to the scheduler
    Ready,
}

/// Command for the scene collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPlacement {
    pub marker_id: Uuid,
    pub identifier: String,
    pub pose: Pose,
    pub surface: SurfaceKind,
    /// Width and height in metres
    pub size: (f32, f32),
    pub placed_at: DateTime<Utc>,
}

/// The scene collaborator: receives placements on the scene context.
#[cfg_attr(test, mockall::automock)]
pub trait MarkerSink: Send + Sync {
    fn place_marker(&self, placement: &MarkerPlacement);
}

/// What happened to one frame delivered to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    NotReady,
    Busy,
    Throttled,
    Submitted,
    SubmissionFailed,
}

/// Why a detected symbol could not be anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    NoHit,
    WrongSurface(SurfaceKind),
}

/// What happened to one completion handled on the scene context
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Placed(MarkerPlacement),
    AlreadySeen(String),
    Unanchored { identifier: String, reason: MissReason },
    NoDetection,
    DetectionFailed(String),
    /// The scene collaborator is gone; the completion was abandoned
    SinkGone,
}

/// Counters describing pipeline activity
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames: AtomicU64,
    submitted: AtomicU64,
    throttled: AtomicU64,
    busy: AtomicU64,
    submission_failures: AtomicU64,
    placements: AtomicU64,
    duplicates: AtomicU64,
    misses: AtomicU64,
    detection_failures: AtomicU64,
    timeouts: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub submitted: u64,
    pub throttled: u64,
    pub busy: u64,
    pub submission_failures: u64,
    pub placements: u64,
    pub duplicates: u64,
    pub misses: u64,
    pub detection_failures: u64,
    /// Recognitions abandoned after the timeout; each may still occupy a
    /// blocking worker thread
    pub timeouts: u64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            submission_failures: self.submission_failures.load(Ordering::Relaxed),
            placements: self.placements.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            detection_failures: self.detection_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Frame-processing coordinator.
///
/// `on_frame_available` runs on the frame-delivery context and never blocks.
/// Recognition runs on the tokio blocking pool. Completions queue up until
/// the host drains them on its scene context with [`ScanPipeline::pump`] or
/// [`ScanPipeline::pump_next`], or hands that job to
/// [`ScanPipeline::start_scene_loop`].
pub struct ScanPipeline {
    config: Arc<ScanConfig>,
    state: RwLock<PipelineState>,
    paused: AtomicBool,
    scheduler: Mutex<DetectionScheduler>,
    engine: DetectionEngine,
    reconciler: GeometryReconciler,
    registry: Mutex<SeenRegistry>,
    sink: Weak<dyn MarkerSink>,
    completions: tokio::sync::Mutex<mpsc::Receiver<Completion>>,
    scene_loop: Mutex<Option<JoinHandle<()>>>,
    stats: PipelineStats,
}

impl ScanPipeline {
    /// Create a pipeline on the current tokio runtime.
    ///
    /// The pipeline does not keep the scene collaborator alive.
    pub fn new(
        config: ScanConfig,
        recognizer: Arc<dyn Recognizer>,
        sink: Weak<dyn MarkerSink>,
    ) -> Result<Self, ScanError> {
        let runtime = Handle::try_current()
            .map_err(|e| ScanError::Lifecycle(format!("no tokio runtime: {}", e)))?;
        Self::with_runtime(config, recognizer, sink, runtime)
    }

    pub fn with_runtime(
        config: ScanConfig,
        recognizer: Arc<dyn Recognizer>,
        sink: Weak<dyn MarkerSink>,
        runtime: Handle,
    ) -> Result<Self, ScanError> {
        config
            .validate()
            .map_err(|e| ScanError::Config(format!("Invalid scan config: {}", e)))?;

        let config = Arc::new(config);
        let (tx, rx) = mpsc::channel(config.completion_buffer);
        let slot = InFlightSlot::new();
        let engine = DetectionEngine::new(
            recognizer,
            config.symbology,
            config.detection_timeout(),
            runtime,
            tx,
        );

        info!(
            symbology = %config.symbology,
            skip_cycles = config.skip_cycles,
            surface = %config.accepted_surface,
            "scan pipeline created"
        );

        Ok(Self {
            scheduler: Mutex::new(DetectionScheduler::new(config.skip_cycles, slot)),
            reconciler: GeometryReconciler::new(config.accepted_surface),
            config,
            state: RwLock::new(PipelineState::Idle),
            paused: AtomicBool::new(false),
            engine,
            registry: Mutex::new(SeenRegistry::new()),
            sink,
            completions: tokio::sync::Mutex::new(rx),
            scene_loop: Mutex::new(None),
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn seen_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn has_seen(&self, identifier: &str) -> bool {
        self.registry.lock().contains(identifier)
    }

    /// `true` while a recognition is outstanding.
    pub fn is_busy(&self) -> bool {
        self.scheduler.lock().slot().is_busy()
    }

    /// Onboarding became active. Only meaningful from `Idle`.
    pub fn on_coaching_started(&self) {
        let mut state = self.state.write();
        match *state {
            PipelineState::Idle => {
                *state = PipelineState::Coaching;
                info!("coaching started");
            }
            other => debug!(state = ?other, "coaching start ignored"),
        }
    }

    /// Onboarding finished; detection begins. `Ready` is terminal.
    pub fn on_coaching_complete(&self) {
        let mut state = self.state.write();
        match *state {
            PipelineState::Idle | PipelineState::Coaching => {
                *state = PipelineState::Ready;
                info!("coaching finished, scanning for symbols");
            }
            PipelineState::Ready => debug!("coaching completion ignored, already ready"),
        }
    }

    pub fn on_session_paused(&self) {
        self.paused.store(true, Ordering::Release);
        info!("tracking session paused");
    }

    /// Tracking resumed; apply the configured [`ResumePolicy`].
    pub fn on_session_resumed(&self) {
        match self.config.resume_policy {
            ResumePolicy::KeepState => {}
            ResumePolicy::ResetSeen => self.registry.lock().clear(),
            ResumePolicy::Restart => {
                self.registry.lock().clear();
                self.scheduler.lock().reset();
                *self.state.write() = PipelineState::Idle;
            }
        }
        self.paused.store(false, Ordering::Release);
        info!(policy = ?self.config.resume_policy, "tracking session resumed");
    }

    /// Offer one tracked frame. Never blocks on recognition.
    pub fn on_frame_available(&self, frame: FrameHandle) -> FrameDecision {
        PipelineStats::bump(&self.stats.frames);

        let ready = self.state() == PipelineState::Ready && !self.is_paused();
        let admission = self.scheduler.lock().evaluate(ready);

        let permit = match admission {
            Admission::Admit(permit) => permit,
            Admission::Reject(Rejection::NotReady) => return FrameDecision::NotReady,
            Admission::Reject(Rejection::Busy) => {
                PipelineStats::bump(&self.stats.busy);
                return FrameDecision::Busy;
            }
            Admission::Reject(Rejection::Throttled) => {
                PipelineStats::bump(&self.stats.throttled);
                return FrameDecision::Throttled;
            }
        };

        match self.engine.submit(frame, permit) {
            Ok(()) => {
                PipelineStats::bump(&self.stats.submitted);
                debug!("frame submitted for recognition");
                FrameDecision::Submitted
            }
            Err(e) => {
                PipelineStats::bump(&self.stats.submission_failures);
                warn!("submission failed: {}", e);
                FrameDecision::SubmissionFailed
            }
        }
    }

    /// Handle every completion already queued. Call from the scene context.
    pub fn pump(&self) -> Vec<PlacementOutcome> {
        let Ok(mut completions) = self.completions.try_lock() else {
            debug!("completions are being drained elsewhere");
            return Vec::new();
        };

        let mut outcomes = Vec::new();
        while let Ok(completion) = completions.try_recv() {
            outcomes.push(self.handle_completion(completion));
        }
        outcomes
    }

    /// Wait for the next completion and handle it.
    ///
    /// Returns `None` once no completion can arrive anymore. The receiver
    /// stays locked until the completion is handled, so `pump` cannot run
    /// alongside it.
    pub async fn pump_next(&self) -> Option<PlacementOutcome> {
        let mut completions = self.completions.lock().await;
        let completion = completions.recv().await?;
        Some(self.handle_completion(completion))
    }

    /// Drain completions on a tokio task, for hosts whose scene can be
    /// mutated from any thread.
    ///
    /// The task holds only a weak reference and ends when the pipeline is
    /// dropped or [`ScanPipeline::stop_scene_loop`] is called.
    pub fn start_scene_loop(self: &Arc<Self>) -> Result<(), ScanError> {
        let mut scene_loop = self.scene_loop.lock();
        if scene_loop.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(ScanError::Lifecycle("scene loop already running".to_string()));
        }

        let weak = Arc::downgrade(self);
        let handle = self.engine.runtime().spawn(async move {
            loop {
                let Some(pipeline) = weak.upgrade() else {
                    break;
                };
                match tokio::time::timeout(SCENE_POLL_INTERVAL, pipeline.pump_next()).await {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(_) => continue,
                }
            }
            debug!("scene loop stopped");
        });

        *scene_loop = Some(handle);
        Ok(())
    }

    pub fn stop_scene_loop(&self) {
        if let Some(handle) = self.scene_loop.lock().take() {
            handle.abort();
        }
    }

    fn handle_completion(&self, completion: Completion) -> PlacementOutcome {
        match completion.into_outcome() {
            DetectionOutcome::Detected(result) => self.place(result),
            DetectionOutcome::Empty => PlacementOutcome::NoDetection,
            DetectionOutcome::Failed(e) => {
                if matches!(e, ScanError::Timeout(_)) {
                    PipelineStats::bump(&self.stats.timeouts);
                }
                PipelineStats::bump(&self.stats.detection_failures);
                warn!("recognition failed: {}", e);
                PlacementOutcome::DetectionFailed(e.to_string())
            }
        }
    }

    fn place(&self, result: DetectionResult) -> PlacementOutcome {
        let DetectionResult {
            identifier,
            region,
            source_frame,
        } = result;

        if !self.registry.lock().is_new(&identifier) {
            PipelineStats::bump(&self.stats.duplicates);
            return PlacementOutcome::AlreadySeen(identifier);
        }

        let hit = match self.reconciler.locate(&region, source_frame.as_ref()) {
            Reconciliation::Anchored(hit) => hit,
            Reconciliation::NoHit => {
                PipelineStats::bump(&self.stats.misses);
                return PlacementOutcome::Unanchored {
                    identifier,
                    reason: MissReason::NoHit,
                };
            }
            Reconciliation::WrongSurface(surface) => {
                PipelineStats::bump(&self.stats.misses);
                return PlacementOutcome::Unanchored {
                    identifier,
                    reason: MissReason::WrongSurface(surface),
                };
            }
        };

        let Some(sink) = self.sink.upgrade() else {
            error!(identifier = %identifier, "scene collaborator dropped, abandoning placement");
            return PlacementOutcome::SinkGone;
        };

        let placement = MarkerPlacement {
            marker_id: Uuid::new_v4(),
            pose: GeometryReconciler::placement_pose(&hit, &source_frame.camera_pose()),
            surface: hit.surface,
            size: self.config.marker_size,
            placed_at: Utc::now(),
            identifier,
        };

        if !self.registry.lock().insert(&placement.identifier) {
            PipelineStats::bump(&self.stats.duplicates);
            return PlacementOutcome::AlreadySeen(placement.identifier);
        }
        sink.place_marker(&placement);
        PipelineStats::bump(&self.stats.placements);
        info!(
            identifier = %placement.identifier,
            marker = %placement.marker_id,
            x = placement.pose.position.x,
            y = placement.pose.position.y,
            z = placement.pose.position.z,
            "marker placed"
        );

        PlacementOutcome::Placed(placement)
    }
}

impl Drop for ScanPipeline {
    fn drop(&mut self) {
        if let Some(handle) = self.scene_loop.get_mut().take() {
            handle.abort();
        }
    }
}
