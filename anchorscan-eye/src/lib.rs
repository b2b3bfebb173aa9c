//! anchorscan-eye: symbol scanning for camera-tracked sessions
//!
//! Watches a stream of tracked frames for a single configured symbology and,
//! on the first sighting of each new symbol, anchors a marker on the mapped
//! surface behind it. Recognition itself and the scene that renders markers
//! are external collaborators, reached through [`Recognizer`] and
//! [`MarkerSink`].

pub mod config;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod processing;

#[cfg(test)]
mod test_utils;

pub use config::{ResumePolicy, ScanConfig};
pub use error::ScanError;
pub use frame::{FrameHandle, TrackedFrame};
pub use pipeline::{
    FrameDecision, MarkerPlacement, MarkerSink, MissReason, PipelineState, PlacementOutcome,
    ScanPipeline, StatsSnapshot,
};
pub use processing::{Candidate, Recognizer};
