//! Recognition of a single configured symbology, off the frame-delivery context

use anchorscan_core::{RecognizerRect, Symbology};
use image::GrayImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::frame::FrameHandle;
use crate::processing::scheduler::SlotPermit;

/// One symbol reported by a recognizer
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Decoded payload, if the recognizer could read one
    pub payload: Option<String>,
    /// Bounding region, bottom-left origin
    pub region: RecognizerRect,
}

/// External pattern-recognition engine.
///
/// Called on a blocking worker thread. Implementations must report
/// candidates in their own native order; the engine uses the first one.
#[cfg_attr(test, mockall::automock)]
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, symbology: Symbology)
        -> Result<Vec<Candidate>, ScanError>;
}

/// A readable symbol found in a frame
#[derive(Clone)]
pub struct DetectionResult {
    pub identifier: String,
    pub region: RecognizerRect,
    pub source_frame: FrameHandle,
}

impl std::fmt::Debug for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionResult")
            .field("identifier", &self.identifier)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// How one submitted recognition ended
#[derive(Debug)]
pub enum DetectionOutcome {
    Detected(DetectionResult),
    Empty,
    Failed(ScanError),
}

impl DetectionOutcome {
    /// Reduce a recognizer answer to at most one detection.
    ///
    /// With several candidates the first reported one wins; there is no
    /// ranking. A candidate without a payload counts as no detection.
    pub fn from_candidates(candidates: Vec<Candidate>, frame: FrameHandle) -> Self {
        let Some(first) = candidates.into_iter().next() else {
            return DetectionOutcome::Empty;
        };

        match first.payload {
            Some(payload) if !payload.is_empty() => {
                info!(identifier = %payload, "symbol detected");
                DetectionOutcome::Detected(DetectionResult {
                    identifier: payload,
                    region: first.region,
                    source_frame: frame,
                })
            }
            _ => {
                warn!("symbol found without payload");
                DetectionOutcome::Empty
            }
        }
    }
}

/// Message delivered to the scene context once a recognition has ended.
///
/// Holds the in-flight slot until the scene context takes the outcome, so
/// no new recognition starts while an earlier result is still queued.
#[derive(Debug)]
pub struct Completion {
    outcome: DetectionOutcome,
    permit: SlotPermit,
}

impl Completion {
    pub fn outcome(&self) -> &DetectionOutcome {
        &self.outcome
    }

    /// Take the outcome and release the in-flight slot.
    pub fn into_outcome(self) -> DetectionOutcome {
        let Completion { outcome, permit } = self;
        drop(permit);
        outcome
    }
}

/// Runs recognitions on the blocking pool and reports completions over a
/// channel.
pub struct DetectionEngine {
    recognizer: Arc<dyn Recognizer>,
    symbology: Symbology,
    timeout: Option<Duration>,
    runtime: Handle,
    completions: mpsc::Sender<Completion>,
}

impl DetectionEngine {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        symbology: Symbology,
        timeout: Option<Duration>,
        runtime: Handle,
        completions: mpsc::Sender<Completion>,
    ) -> Self {
        Self {
            recognizer,
            symbology,
            timeout,
            runtime,
            completions,
        }
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Start recognizing `frame`. Never blocks.
    ///
    /// On `Err` nothing was started and `permit` has already been released.
    /// On `Ok` exactly one [`Completion`] will follow. It carries `permit`,
    /// which is released when the completion is consumed or dropped.
    pub fn submit(&self, frame: FrameHandle, permit: SlotPermit) -> Result<(), ScanError> {
        if frame.captured_image().is_none() {
            return Err(ScanError::Submission("frame image unavailable".to_string()));
        }
        if self.completions.is_closed() {
            return Err(ScanError::Lifecycle("completion receiver dropped".to_string()));
        }

        let recognizer = self.recognizer.clone();
        let symbology = self.symbology;
        let timeout = self.timeout;
        let completions = self.completions.clone();

        self.runtime.spawn(async move {
            let outcome = recognize(recognizer, symbology, timeout, frame).await;

            if completions.send(Completion { outcome, permit }).await.is_err() {
                debug!("pipeline gone, dropping recognition completion");
            }
        });

        Ok(())
    }
}

async fn recognize(
    recognizer: Arc<dyn Recognizer>,
    symbology: Symbology,
    timeout: Option<Duration>,
    frame: FrameHandle,
) -> DetectionOutcome {
    let worker_frame = frame.clone();
    let job = tokio::task::spawn_blocking(move || {
        let image = worker_frame
            .captured_image()
            .ok_or_else(|| ScanError::Submission("frame image recycled".to_string()))?;
        recognizer.recognize(image, symbology)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, job).await {
            Ok(joined) => joined,
            Err(_) => {
                let ms = limit.as_millis() as u64;
                warn!(timeout_ms = ms, "recognition timed out, abandoning worker");
                return DetectionOutcome::Failed(ScanError::Timeout(ms));
            }
        },
        None => job.await,
    };

    match joined {
        Ok(Ok(candidates)) => {
            debug!(count = candidates.len(), "recognition finished");
            DetectionOutcome::from_candidates(candidates, frame)
        }
        Ok(Err(e)) => DetectionOutcome::Failed(e),
        Err(join_err) => {
            DetectionOutcome::Failed(ScanError::Recognition(format!("worker failed: {}", join_err)))
        }
    }
}
