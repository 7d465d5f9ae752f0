//! # Console Configuration
//!
//! Configuration structure and validation for the streaming console.
//!
//! ## Configuration Parameters
//!
//! | Parameter | Type | Default | Description |
//! |-----------|------|---------|-------------|
//! | `base_url` | `String` | `http://127.0.0.1:8000` | Console backend address |
//! | `target_fps` | `u32` | 30 | Pacing target of each fetch loop |
//! | `pacing_window` | `usize` | 5 | Fetch durations averaged by the pacer |
//! | `blank_after_ms` | `u64` | 5000 | Error silence before the preview blanks |
//! | `stop_after_ms` | `u64` | 30000 | Error silence before the stream is stopped |
//! | `sensor_width` / `sensor_height` | `u32` | 4056 × 3040 | Full sensor extent |
//! | `network_id` | `String` | `999999` | Model id sent with direct image captures |
//! | `frame_channel_capacity` | `usize` | 16 | Broadcast depth per device |
//!
//! ## Examples
//!
//! ```rust
//! use edge_console::config::ConsoleConfig;
//!
//! let config = ConsoleConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.policy().stop_after.as_millis(), 30_000);
//! ```

use std::path::Path;
use std::time::Duration;

use console_geometry::Point2D;
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, ConsoleResult};

/// Configuration for the console streaming pipeline.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the console backend serving device commands and
    /// inference results.
    pub base_url: String,

    /// Target frames per second for each device fetch loop.
    ///
    /// The effective period approaches `1000 / target_fps` ms as long as a
    /// fetch is faster than that.
    pub target_fps: u32,

    /// Number of recent fetch durations averaged by the pacer.
    pub pacing_window: usize,

    /// Milliseconds without a good frame before the displayed drawing is
    /// cleared.
    pub blank_after_ms: u64,

    /// Milliseconds without a good frame before the stream is stopped and
    /// the operator is alerted.
    pub stop_after_ms: u64,

    pub sensor_width: u32,
    pub sensor_height: u32,

    /// Network (model) identifier sent with direct image captures.
    pub network_id: String,

    /// Depth of the per-device broadcast channel. Slow consumers skip to the
    /// newest frame.
    pub frame_channel_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            target_fps: 30,
            pacing_window: 5,
            blank_after_ms: 5_000,
            stop_after_ms: 30_000,
            sensor_width: 4056,
            sensor_height: 3040,
            network_id: "999999".to_string(),
            frame_channel_capacity: 16,
        }
    }
}

/// Inactivity thresholds applied by the preview state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewPolicy {
    pub blank_after: Duration,
    pub stop_after: Duration,
}

impl Default for PreviewPolicy {
    fn default() -> Self {
        ConsoleConfig::default().policy()
    }
}

impl ConsoleConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConsoleResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::io("read config", e).with_context(path.display().to_string()))?;
        let config: ConsoleConfig = serde_json::from_str(&text)?;
        config
            .validate()
            .map_err(|reason| ConsoleError::config("config", path.display().to_string(), reason))?;
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("Base URL must not be empty".to_string());
        }
        if self.target_fps == 0 {
            return Err("Target FPS must be greater than 0".to_string());
        }
        if self.pacing_window == 0 {
            return Err("Pacing window must hold at least one sample".to_string());
        }
        if self.blank_after_ms >= self.stop_after_ms {
            return Err("Blank threshold must be shorter than the stop threshold".to_string());
        }
        if self.sensor_width == 0 || self.sensor_height == 0 {
            return Err("Sensor size must be non-zero".to_string());
        }
        if self.frame_channel_capacity == 0 {
            return Err("Frame channel capacity must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn policy(&self) -> PreviewPolicy {
        PreviewPolicy {
            blank_after: Duration::from_millis(self.blank_after_ms),
            stop_after: Duration::from_millis(self.stop_after_ms),
        }
    }

    pub fn sensor_size(&self) -> Point2D {
        Point2D::new(self.sensor_width as f64, self.sensor_height as f64)
    }
}
