//! anchorscan-core: shared vocabulary for the anchorscan workspace
//!
//! Normalized image geometry, world poses, surface and symbology tags, and
//! the workspace-wide error type.

pub mod error;
pub mod geometry;
pub mod types;

pub use error::{Error, Result};
pub use geometry::{
    BottomLeft, NormalizedRect, Origin, Point2, Pose, QueryRect, RecognizerRect, TopLeft,
};
pub use types::{SurfaceKind, Symbology, WorldHit};
