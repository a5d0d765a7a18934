//! Domain error types

use thiserror::Error;

use crate::domain::session::InvalidStateTransition;

/// Classified failure of a probe, capture session or controller call.
///
/// This is the closed set callers branch on; platform-specific errors are
/// translated into it before they leave the application layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Media devices API not supported")]
    Unsupported,

    #[error("No microphone found")]
    NoDevice,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Microphone is unreadable: {0}")]
    DeviceUnreadable(String),

    #[error("Microphone constraints cannot be satisfied: {0}")]
    ConstraintsUnsatisfiable(String),

    #[error("No audio data recorded")]
    NoAudioCaptured,

    #[error(transparent)]
    InvalidStateTransition(#[from] InvalidStateTransition),

    #[error("Recording was cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Stable machine-readable code for the error kind
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::NoDevice => "no-device",
            Self::PermissionDenied => "permission-denied",
            Self::DeviceUnreadable(_) => "device-unreadable",
            Self::ConstraintsUnsatisfiable(_) => "constraints-unsatisfiable",
            Self::NoAudioCaptured => "no-audio-captured",
            Self::InvalidStateTransition(_) => "invalid-state-transition",
            Self::Cancelled => "cancelled",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Error when parsing a duration string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected <number> followed by ms, s or m (e.g., 500ms, 30s, 2m30s)")]
pub struct DurationParseError {
    pub input: String,
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
