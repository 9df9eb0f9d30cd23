use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_READING_RATE_WPM: f64 = 200.0;
pub const DEFAULT_SLACK_FACTOR: f64 = 1.5;
pub const DEFAULT_MAX_CHECKS_PER_SESSION: u32 = 3;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Tunables for dwell tracking and check scheduling.
///
/// Fixed for the lifetime of one content-unit list; a replacement picks up
/// whatever config the controller holds at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingConfig {
    /// Words per minute of a typical reader
    pub reading_rate_wpm: f64,

    /// Multiplier applied to the plain reading time before a unit counts as stuck
    pub slack_factor: f64,

    pub max_checks_per_session: u32,

    /// Wall-clock length of one logical dwell second
    pub tick_interval_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            reading_rate_wpm: DEFAULT_READING_RATE_WPM,
            slack_factor: DEFAULT_SLACK_FACTOR,
            max_checks_per_session: DEFAULT_MAX_CHECKS_PER_SESSION,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl TrackingConfig {
    /// Rejects values that would make expected dwell NaN, infinite or negative.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.reading_rate_wpm.is_finite() && self.reading_rate_wpm > 0.0,
            "reading rate must be a positive number of words per minute (got {})",
            self.reading_rate_wpm
        );
        ensure!(
            self.slack_factor.is_finite() && self.slack_factor >= 0.0,
            "slack factor must be a finite number >= 0 (got {})",
            self.slack_factor
        );
        ensure!(
            self.max_checks_per_session >= 1,
            "at least one check per session is required"
        );
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Expected dwell in seconds: `(words / wpm) * 60 * slack`.
    pub fn expected_dwell_seconds(&self, word_count: u32) -> f64 {
        (word_count as f64 / self.reading_rate_wpm) * 60.0 * self.slack_factor
    }
}
