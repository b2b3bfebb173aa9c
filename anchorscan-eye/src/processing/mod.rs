//! Frame processing stages

pub mod detection;
pub mod geometry;
pub mod registry;
pub mod scheduler;

pub use detection::{
    Candidate, Completion, DetectionEngine, DetectionOutcome, DetectionResult, Recognizer,
};
pub use geometry::{GeometryReconciler, Reconciliation};
pub use registry::SeenRegistry;
pub use scheduler::{Admission, DetectionScheduler, InFlightSlot, Rejection, SlotPermit};
