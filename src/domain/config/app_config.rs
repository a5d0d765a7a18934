//! Application configuration value object

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::recording::Duration;

/// Default capture sample rate request in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default Opus bitrate in bits per second
pub const DEFAULT_BITRATE: u32 = 32_000;

/// Bitrate range accepted by the Opus encoder
pub const BITRATE_RANGE: std::ops::RangeInclusive<u32> = 6_000..=510_000;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: Option<String>,
    pub sample_rate: Option<u32>,
    pub timeslice: Option<String>,
    pub bitrate: Option<u32>,
    pub flush_timeout: Option<String>,
    pub max_duration: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            device: None,
            sample_rate: Some(DEFAULT_SAMPLE_RATE),
            timeslice: Some(Duration::default_timeslice().to_string()),
            bitrate: Some(DEFAULT_BITRATE),
            flush_timeout: Some(Duration::default_flush_timeout().to_string()),
            max_duration: Some(Duration::default_max_duration().to_string()),
            output_dir: None,
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            device: other.device.or(self.device),
            sample_rate: other.sample_rate.or(self.sample_rate),
            timeslice: other.timeslice.or(self.timeslice),
            bitrate: other.bitrate.or(self.bitrate),
            flush_timeout: other.flush_timeout.or(self.flush_timeout),
            max_duration: other.max_duration.or(self.max_duration),
            output_dir: other.output_dir.or(self.output_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    pub fn sample_rate_or_default(&self) -> u32 {
        self.sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Get bitrate, or default if not set/out of range
    pub fn bitrate_or_default(&self) -> u32 {
        self.bitrate
            .filter(|b| BITRATE_RANGE.contains(b))
            .unwrap_or(DEFAULT_BITRATE)
    }

    /// Get timeslice as parsed Duration, or default if not set/invalid
    pub fn timeslice_or_default(&self) -> Duration {
        self.timeslice
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_timeslice)
    }

    /// Get flush_timeout as parsed Duration, or default if not set/invalid
    pub fn flush_timeout_or_default(&self) -> Duration {
        self.flush_timeout
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_flush_timeout)
    }

    /// Get max_duration as parsed Duration, or default if not set/invalid
    pub fn max_duration_or_default(&self) -> Duration {
        self.max_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_max_duration)
    }

    /// Get output directory, or the current directory if not set
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
