//! 2D detection region to 3D placement pose

use anchorscan_core::{Point2, Pose, RecognizerRect, SurfaceKind, WorldHit};
use tracing::{debug, warn};

use crate::frame::TrackedFrame;

/// Result of looking a region up in the tracked world
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    Anchored(WorldHit),
    /// Nothing mapped under the query point
    NoHit,
    /// A hit, but on a surface the pipeline does not anchor to
    WrongSurface(SurfaceKind),
}

/// Turns recognizer regions into world hits and placement poses.
///
/// Only one surface kind is accepted. A miss is an ordinary outcome: the
/// symbol may be floating in front of unmapped geometry, and a later frame
/// can succeed once the surface has been mapped.
#[derive(Debug, Clone, Copy)]
pub struct GeometryReconciler {
    accepted: SurfaceKind,
}

impl GeometryReconciler {
    pub fn new(accepted: SurfaceKind) -> Self {
        Self { accepted }
    }

    pub fn accepted_surface(&self) -> SurfaceKind {
        self.accepted
    }

    /// Query point for a region: its center after flipping into the
    /// top-left-origin convention.
    pub fn query_point(region: &RecognizerRect) -> Point2 {
        region.flip().center()
    }

    pub fn locate(&self, region: &RecognizerRect, frame: &dyn TrackedFrame) -> Reconciliation {
        let point = Self::query_point(region);
        debug!(x = point.x, y = point.y, "querying world at region center");

        let Some(hit) = frame.query(point) else {
            warn!(x = point.x, y = point.y, "no hit");
            return Reconciliation::NoHit;
        };

        if hit.surface != self.accepted {
            warn!(surface = %hit.surface, accepted = %self.accepted, "hit on unsupported surface");
            return Reconciliation::WrongSurface(hit.surface);
        }

        Reconciliation::Anchored(hit)
    }

    pub fn reconcile(&self, region: &RecognizerRect, frame: &dyn TrackedFrame) -> Option<WorldHit> {
        match self.locate(region, frame) {
            Reconciliation::Anchored(hit) => Some(hit),
            _ => None,
        }
    }

    /// Marker pose for a hit: at the hit position, turned about the vertical
    /// axis to the camera's heading. Camera pitch and roll are ignored.
    pub fn placement_pose(hit: &WorldHit, camera: &Pose) -> Pose {
        Pose::upright(hit.pose.position, camera.yaw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StaticFrame;
    use anchorscan_core::QueryRect;
    use glam::{EulerRot, Quat, Vec3};

    fn wall_hit() -> WorldHit {
        WorldHit::new(
            Pose::from_position(Vec3::new(0.3, 1.2, -2.0)),
            SurfaceKind::VerticalPlane,
        )
    }

    #[test]
    fn test_query_point_reference_region() {
        let region = RecognizerRect::new(0.4, 0.1, 0.2, 0.1);
        let point = GeometryReconciler::query_point(&region);
        assert!((point.x - 0.5).abs() < 1e-6);
        assert!((point.y - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_locate_queries_flipped_center() {
        let frame = StaticFrame::new(Pose::default())
            .with_surface(QueryRect::new(0.45, 0.8, 0.1, 0.1), wall_hit());
        let reconciler = GeometryReconciler::new(SurfaceKind::VerticalPlane);

        let region = RecognizerRect::new(0.4, 0.1, 0.2, 0.1);
        assert_eq!(reconciler.locate(&region, &frame), Reconciliation::Anchored(wall_hit()));

        let queried = frame.queried_points();
        assert_eq!(queried.len(), 1);
        assert!((queried[0].y - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_unflipped_center_would_miss() {
        // Surface only covers the lower part of the image in top-left terms.
        let frame = StaticFrame::new(Pose::default())
            .with_surface(QueryRect::new(0.0, 0.7, 1.0, 0.3), wall_hit());
        let reconciler = GeometryReconciler::new(SurfaceKind::VerticalPlane);

        let near_bottom = RecognizerRect::new(0.4, 0.1, 0.2, 0.1);
        assert!(reconciler.reconcile(&near_bottom, &frame).is_some());

        let near_top = RecognizerRect::new(0.4, 0.8, 0.2, 0.1);
        assert!(reconciler.reconcile(&near_top, &frame).is_none());
    }

    #[test]
    fn test_no_hit() {
        let frame = StaticFrame::new(Pose::default());
        let reconciler = GeometryReconciler::new(SurfaceKind::VerticalPlane);
        let region = RecognizerRect::new(0.4, 0.1, 0.2, 0.1);
        assert_eq!(reconciler.locate(&region, &frame), Reconciliation::NoHit);
        assert!(reconciler.reconcile(&region, &frame).is_none());
    }

    #[test]
    fn test_wrong_surface() {
        let floor = WorldHit::new(Pose::default(), SurfaceKind::HorizontalPlane);
        let frame =
            StaticFrame::new(Pose::default()).with_surface(QueryRect::new(0.0, 0.0, 1.0, 1.0), floor);
        let reconciler = GeometryReconciler::new(SurfaceKind::VerticalPlane);
        let region = RecognizerRect::new(0.4, 0.4, 0.2, 0.2);
        assert_eq!(
            reconciler.locate(&region, &frame),
            Reconciliation::WrongSurface(SurfaceKind::HorizontalPlane)
        );
    }

    #[test]
    fn test_horizontal_can_be_configured() {
        let floor = WorldHit::new(Pose::default(), SurfaceKind::HorizontalPlane);
        let frame =
            StaticFrame::new(Pose::default()).with_surface(QueryRect::new(0.0, 0.0, 1.0, 1.0), floor);
        let reconciler = GeometryReconciler::new(SurfaceKind::HorizontalPlane);
        let region = RecognizerRect::new(0.4, 0.4, 0.2, 0.2);
        assert_eq!(reconciler.reconcile(&region, &frame), Some(floor));
    }

    #[test]
    fn test_placement_pose_uses_camera_yaw_only() {
        let camera = Pose::new(
            Vec3::new(0.0, 1.6, 0.0),
            Quat::from_euler(EulerRot::YXZ, 0.9, -0.5, 0.2),
        );
        let pose = GeometryReconciler::placement_pose(&wall_hit(), &camera);

        assert_eq!(pose.position, Vec3::new(0.3, 1.2, -2.0));
        assert!((pose.yaw() - 0.9).abs() < 1e-5);
        // Upright: the marker's local up axis stays world up.
        let up = pose.orientation * Vec3::Y;
        assert!((up - Vec3::Y).length() < 1e-5);
    }
}
