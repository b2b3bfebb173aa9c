//! Configuration for anchorscan-eye

use anchorscan_core::{SurfaceKind, Symbology};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ScanError;

const MAX_SKIP_CYCLES: u32 = 10_000;

/// What happens to pipeline state when the tracking session resumes after a pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Keep the pipeline state and every identifier already placed
    #[default]
    KeepState,
    /// Forget placed identifiers so markers can be placed again
    ResetSeen,
    /// Forget placed identifiers and go back to `Idle`
    Restart,
}

impl FromStr for ResumePolicy {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "keep_state" | "keep" => Ok(ResumePolicy::KeepState),
            "reset_seen" => Ok(ResumePolicy::ResetSeen),
            "restart" => Ok(ResumePolicy::Restart),
            other => Err(ScanError::Config(format!("unknown resume policy '{}'", other))),
        }
    }
}

/// Scan pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Frames skipped between two recognition submissions
    pub skip_cycles: u32,
    /// The single pattern family the recognizer looks for
    pub symbology: Symbology,
    /// Surface kind a detection must land on to be anchored
    pub accepted_surface: SurfaceKind,
    /// Upper bound on one recognition call; `None` waits forever.
    ///
    /// A timed-out call cannot be interrupted: its blocking worker thread
    /// stays busy until the recognizer returns, and the late result is
    /// discarded. A recognizer that never returns leaks one worker per
    /// timeout. `StatsSnapshot::timeouts` counts these.
    pub detection_timeout_ms: Option<u64>,
    /// Behavior on session pause/resume
    pub resume_policy: ResumePolicy,
    /// Marker width and height in metres
    pub marker_size: (f32, f32),
    /// Capacity of the completion channel towards the scene context
    pub completion_buffer: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            skip_cycles: 20,
            symbology: Symbology::Ean13,
            accepted_surface: SurfaceKind::VerticalPlane,
            detection_timeout_ms: Some(3000),
            resume_policy: ResumePolicy::KeepState,
            marker_size: (0.05, 0.03),
            completion_buffer: 64,
        }
    }
}

impl ScanConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.skip_cycles > MAX_SKIP_CYCLES {
            return Err(format!("skip_cycles must be at most {}", MAX_SKIP_CYCLES));
        }

        if self.detection_timeout_ms == Some(0) {
            return Err("detection_timeout_ms must be > 0 when set".to_string());
        }

        let (width, height) = self.marker_size;
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err("marker_size must be finite and positive".to_string());
        }

        if self.completion_buffer == 0 {
            return Err("completion_buffer must be > 0".to_string());
        }

        Ok(())
    }

    pub fn detection_timeout(&self) -> Option<Duration> {
        self.detection_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse configuration from JSON, TOML or YAML
    pub fn from_str(content: &str) -> Result<Self, ScanError> {
        let config = if let Ok(config) = serde_json::from_str::<ScanConfig>(content) {
            config
        } else if let Ok(config) = toml::from_str::<ScanConfig>(content) {
            config
        } else if let Ok(config) = serde_yaml::from_str::<ScanConfig>(content) {
            config
        } else {
            return Err(ScanError::Config("Unknown format".to_string()));
        };

        config.validate().map_err(ScanError::Config)?;
        Ok(config)
    }

    /// Defaults overlaid with `ANCHORSCAN_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `ANCHORSCAN_*` environment variables on this configuration
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("ANCHORSCAN_SKIP_CYCLES") {
            if let Ok(n) = value.parse::<u32>() {
                self.skip_cycles = n;
            }
        }

        if let Ok(value) = std::env::var("ANCHORSCAN_DETECTION_TIMEOUT_MS") {
            if value.eq_ignore_ascii_case("none") {
                self.detection_timeout_ms = None;
            } else if let Ok(ms) = value.parse::<u64>() {
                self.detection_timeout_ms = Some(ms);
            }
        }

        if let Ok(value) = std::env::var("ANCHORSCAN_RESUME_POLICY") {
            if let Ok(policy) = value.parse::<ResumePolicy>() {
                self.resume_policy = policy;
            }
        }
    }
}
