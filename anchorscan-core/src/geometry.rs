//! Normalized image-space geometry and world-space poses
//!
//! Recognizers report regions with the origin at the bottom-left corner and
//! the Y axis pointing up. World queries expect the origin at the top-left
//! corner with Y pointing down. Both conventions share the `0..1` range on
//! each axis; the convention is carried in the type so a region cannot be
//! handed to the wrong consumer without an explicit [`NormalizedRect::flip`].

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// Marker for a coordinate origin convention.
pub trait Origin: Copy + fmt::Debug + Default + Send + Sync + 'static {
    /// The convention obtained by mirroring the Y axis.
    type Flipped: Origin<Flipped = Self>;

    const NAME: &'static str;
}

/// Origin bottom-left, Y up (recognizer convention).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BottomLeft;

/// Origin top-left, Y down (world query convention).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopLeft;

impl Origin for BottomLeft {
    type Flipped = TopLeft;
    const NAME: &'static str = "bottom-left";
}

impl Origin for TopLeft {
    type Flipped = BottomLeft;
    const NAME: &'static str = "top-left";
}

/// A point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in normalized image coordinates.
///
/// `y` is the edge closest to the origin of convention `O`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NormalizedRect<O: Origin> {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(skip)]
    origin: PhantomData<O>,
}

/// Region as reported by a recognizer.
pub type RecognizerRect = NormalizedRect<BottomLeft>;

/// Region in the convention expected by world queries.
pub type QueryRect = NormalizedRect<TopLeft>;

impl<O: Origin> NormalizedRect<O> {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            origin: PhantomData,
        }
    }

    /// Build a rectangle, rejecting non-finite or negative extents.
    pub fn try_new(x: f32, y: f32, width: f32, height: f32) -> Result<Self> {
        if !(x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite()) {
            return Err(Error::Geometry(format!(
                "non-finite rect ({}, {}, {}, {})",
                x, y, width, height
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(Error::Geometry(format!(
                "negative extent {}x{}",
                width, height
            )));
        }
        Ok(Self::new(x, y, width, height))
    }

    pub fn min_x(&self) -> f32 {
        self.x
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn min_y(&self) -> f32 {
        self.y
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point2 {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point2) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }

    /// Mirror the rectangle across the horizontal midline (`y' = 1 - y`).
    ///
    /// Both edges are mirrored, so the edge that was farthest from the old
    /// origin becomes the one closest to the new origin. Applying it twice
    /// yields the original rectangle.
    pub fn flip(&self) -> NormalizedRect<O::Flipped> {
        let top = 1.0 - self.max_y();
        let bottom = 1.0 - self.min_y();
        NormalizedRect::new(self.x, top, self.width, bottom - top)
    }

    pub fn convention(&self) -> &'static str {
        O::NAME
    }
}

impl<O: Origin> fmt::Display for NormalizedRect<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[x={:.3} y={:.3} w={:.3} h={:.3} ({})]",
            self.x,
            self.y,
            self.width,
            self.height,
            O::NAME
        )
    }
}

/// Position plus orientation in tracked world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Rotation about the vertical (Y) axis, ignoring pitch and roll.
    pub fn yaw(&self) -> f32 {
        let (yaw, _pitch, _roll) = self.orientation.to_euler(EulerRot::YXZ);
        yaw
    }

    /// A pose at `position` rotated only about the vertical axis.
    pub fn upright(position: Vec3, yaw: f32) -> Self {
        Self::new(position, Quat::from_rotation_y(yaw))
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}
