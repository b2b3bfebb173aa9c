//! Session scripts: recorded or hand-written frame sequences for replay

use anchorscan_core::{Pose, QueryRect, RecognizerRect, SurfaceKind, WorldHit};
use anyhow::{anyhow, Context, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Host lifecycle signal delivered before a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    CoachingStarted,
    CoachingComplete,
    Paused,
    Resumed,
}

/// What the recognizer reports if it is handed this frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedDetection {
    pub payload: Option<String>,
    /// `[x, y, width, height]`, bottom-left origin
    pub region: [f32; 4],
}

/// A mapped plane visible in the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPlane {
    /// `[x, y, width, height]` the plane covers, top-left origin
    pub extent: [f32; 4],
    /// World position returned for any hit on this plane
    pub position: [f32; 3],
    #[serde(default)]
    pub surface: SurfaceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFrame {
    /// Camera heading in radians
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub event: Option<SessionEvent>,
    #[serde(default)]
    pub detection: Option<ScriptedDetection>,
    #[serde(default)]
    pub planes: Vec<ScriptedPlane>,
    /// `false` simulates a frame whose image was recycled before submission
    #[serde(default = "default_true")]
    pub readable: bool,
    /// Repeat this frame this many times
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    /// Deliver coaching start/complete before the first frame
    #[serde(default = "default_true")]
    pub start_ready: bool,
    pub frames: Vec<ScriptedFrame>,
}

fn default_true() -> bool {
    true
}

fn default_repeat() -> u32 {
    1
}

impl ScriptedDetection {
    pub fn region(&self) -> Result<RecognizerRect> {
        let [x, y, w, h] = self.region;
        Ok(RecognizerRect::try_new(x, y, w, h)?)
    }
}

impl ScriptedPlane {
    pub fn extent(&self) -> Result<QueryRect> {
        let [x, y, w, h] = self.extent;
        Ok(QueryRect::try_new(x, y, w, h)?)
    }

    pub fn hit(&self) -> WorldHit {
        WorldHit::new(Pose::from_position(Vec3::from(self.position)), self.surface)
    }
}

impl ScriptedFrame {
    pub fn camera_pose(&self) -> Pose {
        Pose::new(Vec3::ZERO, Quat::from_rotation_y(self.yaw))
    }
}

impl SessionScript {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading session script {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse a script from JSON or TOML
    pub fn from_str(content: &str) -> Result<Self> {
        let script = if let Ok(script) = serde_json::from_str::<SessionScript>(content) {
            script
        } else {
            toml::from_str::<SessionScript>(content)
                .map_err(|e| anyhow!("session script is neither JSON nor TOML: {}", e))?
        };

        for (index, frame) in script.frames.iter().enumerate() {
            if let Some(detection) = &frame.detection {
                detection
                    .region()
                    .with_context(|| format!("frame {}: bad detection region", index))?;
            }
            for plane in &frame.planes {
                plane
                    .extent()
                    .with_context(|| format!("frame {}: bad plane extent", index))?;
            }
        }

        Ok(script)
    }

    /// Frame count after expanding repeats
    pub fn frame_count(&self) -> usize {
        self.frames.iter().map(|f| f.repeat as usize).sum()
    }
}
