//! Tracked frames supplied by the camera-tracking collaborator

use anchorscan_core::{Point2, Pose, WorldHit};
use image::GrayImage;
use std::sync::Arc;

/// One sampling instant of a camera-tracking session.
///
/// The collaborator owns the frame and may recycle its buffers once the
/// callback that delivered it returns. The pipeline only keeps a handle
/// while the single in-flight recognition for that frame is running, and
/// releases it when the completion has been handled.
pub trait TrackedFrame: Send + Sync {
    /// Luma plane of the captured image, if it is still readable.
    fn captured_image(&self) -> Option<&GrayImage>;

    /// Camera pose at capture time.
    fn camera_pose(&self) -> Pose;

    /// Map a top-left-origin normalized point to a hit on an already-mapped
    /// surface, using the surface's known extent. Returns the nearest hit.
    fn query(&self, point: Point2) -> Option<WorldHit>;
}

/// Shared handle to a frame.
pub type FrameHandle = Arc<dyn TrackedFrame>;
