use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::MeterError;
use crate::processing::loudness::LoudnessScale;

/// What the capture loop publishes when the source flags a block as silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilencePolicy {
    /// Leave both level cells at their previous values.
    #[default]
    Hold,
    /// Publish 0.0 to both cells.
    Zero,
}

/// Configuration for a metering session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfiguration {
    /// Wait between drains when the source has nothing queued (default: 10 ms).
    pub poll_interval_ms: u64,

    /// Silent-block handling (default: hold).
    pub silence_policy: SilencePolicy,

    /// dB window and epsilon used to map RMS to a 0–1 level.
    pub scale: LoudnessScale,
}

impl MeterConfiguration {
    pub const MAX_POLL_INTERVAL_MS: u64 = 1000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > Self::MAX_POLL_INTERVAL_MS {
            return Err(format!(
                "poll interval must be within 1..={} ms, got {}",
                Self::MAX_POLL_INTERVAL_MS,
                self.poll_interval_ms
            ));
        }
        if !self.scale.floor_db.is_finite() || self.scale.floor_db >= 0.0 {
            return Err(format!("floor must be below 0 dB, got {}", self.scale.floor_db));
        }
        if !self.scale.epsilon.is_finite() || self.scale.epsilon <= 0.0 {
            return Err(format!("epsilon must be positive, got {}", self.scale.epsilon));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, MeterError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| MeterError::ConfigurationFailed(e.to_string()))?;
        config.validate().map_err(MeterError::ConfigurationFailed)?;
        Ok(config)
    }
}

impl Default for MeterConfiguration {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            silence_policy: SilencePolicy::Hold,
            scale: LoudnessScale::default(),
        }
    }
}
