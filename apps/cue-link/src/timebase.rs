//! Conversion between frame positions and wall-clock milliseconds.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Frames per second of a timeline. Only positive finite rates exist, so the
/// conversions below never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct FrameRate(f64);

impl FrameRate {
    pub fn new(fps: f64) -> Result<Self, ConfigError> {
        if fps.is_finite() && fps > 0.0 {
            Ok(Self(fps))
        } else {
            Err(ConfigError::InvalidFrameRate(fps))
        }
    }

    pub fn fps(self) -> f64 {
        self.0
    }

    /// Duration of a single frame in milliseconds.
    pub fn frame_millis(self) -> f64 {
        1000.0 / self.0
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(24.0)
    }
}

impl TryFrom<f64> for FrameRate {
    type Error = ConfigError;

    fn try_from(fps: f64) -> Result<Self, Self::Error> {
        Self::new(fps)
    }
}

impl From<FrameRate> for f64 {
    fn from(rate: FrameRate) -> Self {
        rate.0
    }
}

pub fn frames_to_millis(frames: i64, rate: FrameRate) -> f64 {
    frames as f64 * rate.frame_millis()
}

/// Nearest whole frame for a millisecond offset.
pub fn millis_to_frames(millis: f64, rate: FrameRate) -> i64 {
    (millis / rate.frame_millis()).round() as i64
}
