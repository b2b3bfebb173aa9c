//! Drive a real scan pipeline from a session script

use anchorscan_core::{Point2, Pose, QueryRect, Symbology, WorldHit};
use anchorscan_eye::{
    Candidate, FrameDecision, FrameHandle, MarkerPlacement, MarkerSink, PlacementOutcome,
    Recognizer, ScanConfig, ScanError, ScanPipeline, StatsSnapshot, TrackedFrame,
};
use anyhow::Result;
use image::GrayImage;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::script::{ScriptedFrame, SessionEvent, SessionScript};

struct ReplayFrame {
    camera: Pose,
    image: Option<GrayImage>,
    planes: Vec<(QueryRect, WorldHit)>,
}

impl ReplayFrame {
    fn from_script(frame: &ScriptedFrame) -> Result<Self> {
        let planes = frame
            .planes
            .iter()
            .map(|plane| Ok((plane.extent()?, plane.hit())))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            camera: frame.camera_pose(),
            image: frame.readable.then(|| GrayImage::new(4, 4)),
            planes,
        })
    }
}

impl TrackedFrame for ReplayFrame {
    fn captured_image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    fn camera_pose(&self) -> Pose {
        self.camera
    }

    // Planes are listed nearest first.
    fn query(&self, point: Point2) -> Option<WorldHit> {
        self.planes
            .iter()
            .find(|(extent, _)| extent.contains(point))
            .map(|(_, hit)| *hit)
    }
}

/// Recognizer answering with whatever the driver staged for the current frame.
///
/// Replay drains each completion before offering the next frame, so the
/// staged answer always belongs to the frame being recognized.
#[derive(Default)]
struct ReplayRecognizer {
    staged: Mutex<Option<Candidate>>,
}

impl ReplayRecognizer {
    fn stage(&self, candidate: Option<Candidate>) {
        *self.staged.lock() = candidate;
    }
}

impl Recognizer for ReplayRecognizer {
    fn recognize(
        &self,
        _image: &GrayImage,
        _symbology: Symbology,
    ) -> Result<Vec<Candidate>, ScanError> {
        Ok(self.staged.lock().take().into_iter().collect())
    }
}

#[derive(Default)]
struct CollectingSink {
    placements: Mutex<Vec<MarkerPlacement>>,
}

impl MarkerSink for CollectingSink {
    fn place_marker(&self, placement: &MarkerPlacement) {
        debug!(identifier = %placement.identifier, "replay sink received marker");
        self.placements.lock().push(placement.clone());
    }
}

/// One recognition that ran during replay
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeRecord {
    pub frame: usize,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub outcomes: Vec<OutcomeRecord>,
    pub placements: Vec<MarkerPlacement>,
    pub stats: StatsSnapshot,
}

fn describe(outcome: &PlacementOutcome) -> String {
    match outcome {
        PlacementOutcome::Placed(p) => format!("placed {}", p.identifier),
        PlacementOutcome::AlreadySeen(id) => format!("already seen {}", id),
        PlacementOutcome::Unanchored { identifier, reason } => {
            format!("unanchored {} ({:?})", identifier, reason)
        }
        PlacementOutcome::NoDetection => "no detection".to_string(),
        PlacementOutcome::DetectionFailed(e) => format!("failed: {}", e),
        PlacementOutcome::SinkGone => "sink gone".to_string(),
    }
}

fn apply_event(pipeline: &ScanPipeline, event: SessionEvent) {
    match event {
        SessionEvent::CoachingStarted => pipeline.on_coaching_started(),
        SessionEvent::CoachingComplete => pipeline.on_coaching_complete(),
        SessionEvent::Paused => pipeline.on_session_paused(),
        SessionEvent::Resumed => pipeline.on_session_resumed(),
    }
}

/// Run every scripted frame through a fresh pipeline.
pub async fn run(script: &SessionScript, config: ScanConfig) -> Result<ReplayReport> {
    let recognizer = Arc::new(ReplayRecognizer::default());
    let sink = Arc::new(CollectingSink::default());
    let scene: Arc<dyn MarkerSink> = sink.clone();
    let pipeline = ScanPipeline::new(config, recognizer.clone(), Arc::downgrade(&scene))?;

    if script.start_ready {
        pipeline.on_coaching_started();
        pipeline.on_coaching_complete();
    }

    let mut index = 0;
    let mut outcomes = Vec::new();
    for scripted in &script.frames {
        if let Some(event) = scripted.event {
            apply_event(&pipeline, event);
        }

        let candidate = match &scripted.detection {
            Some(detection) => Some(Candidate {
                payload: detection.payload.clone(),
                region: detection.region()?,
            }),
            None => None,
        };
        let frame: FrameHandle = Arc::new(ReplayFrame::from_script(scripted)?);

        for _ in 0..scripted.repeat {
            recognizer.stage(candidate.clone());
            if pipeline.on_frame_available(frame.clone()) == FrameDecision::Submitted {
                if let Some(outcome) = pipeline.pump_next().await {
                    outcomes.push(OutcomeRecord {
                        frame: index,
                        outcome: describe(&outcome),
                    });
                }
            }
            index += 1;
        }
    }

    let stats = pipeline.stats();
    info!(
        frames = index,
        submitted = stats.submitted,
        placements = stats.placements,
        "replay finished"
    );

    let placements = sink.placements.lock().clone();
    Ok(ReplayReport {
        frames: index,
        outcomes,
        placements,
        stats,
    })
}

pub fn print_table(report: &ReplayReport) {
    println!("{:<8} OUTCOME", "FRAME");
    for record in &report.outcomes {
        println!("{:<8} {}", record.frame, record.outcome);
    }

    println!();
    println!(
        "{:<16} {:>9} {:>9} {:>9} {:>7}",
        "IDENTIFIER", "X", "Y", "Z", "YAW"
    );
    for placement in &report.placements {
        let position = placement.pose.position;
        println!(
            "{:<16} {:>9.3} {:>9.3} {:>9.3} {:>7.3}",
            placement.identifier,
            position.x,
            position.y,
            position.z,
            placement.pose.yaw()
        );
    }

    let stats = &report.stats;
    println!();
    println!(
        "frames={} submitted={} throttled={} busy={} placed={} duplicates={} misses={} failures={} timeouts={}",
        report.frames,
        stats.submitted,
        stats.throttled,
        stats.busy,
        stats.placements,
        stats.duplicates,
        stats.misses,
        stats.detection_failures + stats.submission_failures,
        stats.timeouts
    );
}
