//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::recording::Duration;

/// SmartMemo - voice memo recorder
#[derive(Parser, Debug)]
#[command(name = "smart-memo")]
#[command(version)]
#[command(about = "Record voice memos from the microphone to Ogg/Opus files")]
#[command(long_about = None)]
pub struct Cli {
    /// Write the recording to this file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Stop automatically after this long (e.g., 90s, 5m, 1m30s)
    #[arg(short = 'm', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// Input device to record from (see `smart-memo devices`)
    #[arg(short = 'd', long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Sample rate to request from the device, in Hz
    #[arg(long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Opus bitrate in bits per second
    #[arg(long, value_name = "BPS")]
    pub bitrate: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a microphone is available and usable
    Probe {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// List audio input devices
    Devices {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Open a device briefly and report whether it yields live audio
    TestDevice {
        /// Device to test (defaults to the system default input)
        device: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed recording options
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub output: PathBuf,
    pub max_duration: Duration,
    pub device: Option<String>,
    pub sample_rate: u32,
    pub timeslice: Duration,
    pub bitrate: u32,
    pub flush_timeout: Duration,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "device",
    "sample_rate",
    "timeslice",
    "bitrate",
    "flush_timeout",
    "max_duration",
    "output_dir",
    "log_level",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
