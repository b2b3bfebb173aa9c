//! Frames with fixed content for unit tests

use anchorscan_core::{Point2, Pose, QueryRect, WorldHit};
use image::GrayImage;
use parking_lot::Mutex;

use crate::frame::TrackedFrame;

pub(crate) struct StaticFrame {
    camera: Pose,
    image: Option<GrayImage>,
    surfaces: Vec<(QueryRect, WorldHit)>,
    queried: Mutex<Vec<Point2>>,
}

impl StaticFrame {
    pub(crate) fn new(camera: Pose) -> Self {
        Self {
            camera,
            image: Some(GrayImage::new(8, 8)),
            surfaces: Vec::new(),
            queried: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn without_image(mut self) -> Self {
        self.image = None;
        self
    }

    /// Mapped surface covering `extent` in top-left image coordinates.
    pub(crate) fn with_surface(mut self, extent: QueryRect, hit: WorldHit) -> Self {
        self.surfaces.push((extent, hit));
        self
    }

    pub(crate) fn queried_points(&self) -> Vec<Point2> {
        self.queried.lock().clone()
    }
}

impl TrackedFrame for StaticFrame {
    fn captured_image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    fn camera_pose(&self) -> Pose {
        self.camera
    }

    fn query(&self, point: Point2) -> Option<WorldHit> {
        self.queried.lock().push(point);
        self.surfaces
            .iter()
            .find(|(extent, _)| extent.contains(point))
            .map(|(_, hit)| *hit)
    }
}
