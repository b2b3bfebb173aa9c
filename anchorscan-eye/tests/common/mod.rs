//! Shared fakes for pipeline integration tests
#![allow(dead_code)]

use anchorscan_core::{Point2, Pose, QueryRect, RecognizerRect, Symbology, WorldHit};
use anchorscan_eye::{Candidate, MarkerPlacement, MarkerSink, Recognizer, ScanError, TrackedFrame};
use image::GrayImage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Frame with a fixed camera pose and a list of mapped surfaces.
pub struct SimFrame {
    camera: Pose,
    image: Option<GrayImage>,
    surfaces: Vec<(QueryRect, WorldHit)>,
}

impl SimFrame {
    pub fn new(camera: Pose) -> Self {
        Self {
            camera,
            image: Some(GrayImage::new(16, 16)),
            surfaces: Vec::new(),
        }
    }

    pub fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    pub fn with_surface(mut self, extent: QueryRect, hit: WorldHit) -> Self {
        self.surfaces.push((extent, hit));
        self
    }
}

impl TrackedFrame for SimFrame {
    fn captured_image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    fn camera_pose(&self) -> Pose {
        self.camera
    }

    fn query(&self, point: Point2) -> Option<WorldHit> {
        self.surfaces
            .iter()
            .find(|(extent, _)| extent.contains(point))
            .map(|(_, hit)| *hit)
    }
}

/// One scripted recognizer answer
#[derive(Clone)]
pub struct Step {
    pub delay: Duration,
    pub result: Result<Vec<Candidate>, String>,
}

impl Step {
    pub fn found(payload: &str, region: RecognizerRect) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(vec![Candidate {
                payload: Some(payload.to_string()),
                region,
            }]),
        }
    }

    pub fn nothing() -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(Vec::new()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Recognizer that replays steps in order, then repeats a fallback step.
///
/// Tracks how many calls overlap so tests can check single-flight.
pub struct ScriptedRecognizer {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(steps: Vec<Step>, fallback: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(
        &self,
        _image: &GrayImage,
        _symbology: Symbology,
    ) -> Result<Vec<Candidate>, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if !step.delay.is_zero() {
            std::thread::sleep(step.delay);
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        step.result.map_err(ScanError::Recognition)
    }
}

/// Sink that keeps every placement it receives.
#[derive(Default)]
pub struct RecordingSink {
    placements: Mutex<Vec<MarkerPlacement>>,
}

impl RecordingSink {
    pub fn placements(&self) -> Vec<MarkerPlacement> {
        self.placements.lock().clone()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.placements
            .lock()
            .iter()
            .map(|p| p.identifier.clone())
            .collect()
    }
}

impl MarkerSink for RecordingSink {
    fn place_marker(&self, placement: &MarkerPlacement) {
        self.placements.lock().push(placement.clone());
    }
}

/// Region used by most tests: lower part of the image, bottom-left origin.
pub fn low_region() -> RecognizerRect {
    RecognizerRect::new(0.4, 0.1, 0.2, 0.1)
}

/// Whole-image extent in query coordinates.
pub fn everywhere() -> QueryRect {
    QueryRect::new(0.0, 0.0, 1.0, 1.0)
}
