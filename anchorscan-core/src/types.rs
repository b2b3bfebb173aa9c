use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::geometry::Pose;

/// Pattern family a recognizer is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    #[default]
    Ean13,
    Ean8,
    UpcE,
    Code128,
    Qr,
    DataMatrix,
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbology::Ean13 => write!(f, "ean13"),
            Symbology::Ean8 => write!(f, "ean8"),
            Symbology::UpcE => write!(f, "upc_e"),
            Symbology::Code128 => write!(f, "code128"),
            Symbology::Qr => write!(f, "qr"),
            Symbology::DataMatrix => write!(f, "data_matrix"),
        }
    }
}

/// Classification of a mapped surface in the tracked scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    #[default]
    VerticalPlane,
    HorizontalPlane,
    /// Hit against something that is not a mapped plane (feature points, meshes)
    Unclassified,
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceKind::VerticalPlane => write!(f, "vertical-surface"),
            SurfaceKind::HorizontalPlane => write!(f, "horizontal-surface"),
            SurfaceKind::Unclassified => write!(f, "unclassified"),
        }
    }
}

impl FromStr for SurfaceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertical" | "vertical-surface" | "vertical_plane" => Ok(SurfaceKind::VerticalPlane),
            "horizontal" | "horizontal-surface" | "horizontal_plane" => {
                Ok(SurfaceKind::HorizontalPlane)
            }
            "unclassified" => Ok(SurfaceKind::Unclassified),
            other => Err(Error::Configuration(format!("unknown surface kind '{}'", other))),
        }
    }
}

/// Result of a successful world query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldHit {
    pub pose: Pose,
    pub surface: SurfaceKind,
}

impl WorldHit {
    pub fn new(pose: Pose, surface: SurfaceKind) -> Self {
        Self { pose, surface }
    }
}
