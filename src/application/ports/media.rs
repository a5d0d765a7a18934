//! Media device port interfaces
//!
//! Models the platform's capture surface: device enumeration, stream
//! acquisition with processing constraints, and a chunked encoder whose
//! callbacks arrive as [`RecorderEvent`]s on a channel.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::device::DeviceDescriptor;
use crate::domain::recording::{AudioMimeType, Duration};

/// Error names a media platform reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformErrorName {
    NotAllowed,
    NotFound,
    NotReadable,
    Overconstrained,
    NotSupported,
    Aborted,
    Security,
    InvalidState,
    Encoding,
    Unknown,
}

impl PlatformErrorName {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAllowed => "NotAllowedError",
            Self::NotFound => "NotFoundError",
            Self::NotReadable => "NotReadableError",
            Self::Overconstrained => "OverconstrainedError",
            Self::NotSupported => "NotSupportedError",
            Self::Aborted => "AbortError",
            Self::Security => "SecurityError",
            Self::InvalidState => "InvalidStateError",
            Self::Encoding => "EncodingError",
            Self::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for PlatformErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw failure reported by the media platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct PlatformError {
    pub name: PlatformErrorName,
    pub message: String,
}

impl PlatformError {
    pub fn new(name: PlatformErrorName, message: impl Into<String>) -> Self {
        Self {
            name,
            message: message.into(),
        }
    }
}

/// Input processing stages the platform may apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl ProcessingConstraints {
    pub const fn disabled() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }

    pub const fn enabled() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }

    pub const fn any_enabled(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

/// Constraints for opening an audio stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Exact device to open; `None` picks the platform default
    pub device_id: Option<String>,
    pub processing: ProcessingConstraints,
    /// Ideal sample rate; the platform may pick another
    pub sample_rate: Option<u32>,
}

impl StreamConstraints {
    /// Raw stream used to check that a device yields a live track
    pub fn probe() -> Self {
        Self {
            device_id: None,
            processing: ProcessingConstraints::disabled(),
            sample_rate: None,
        }
    }

    /// Test stream pinned to one device
    pub fn exact_device(device_id: Option<&str>) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            ..Self::probe()
        }
    }

    /// Stream used for an actual recording
    pub fn recording(device_id: Option<String>, sample_rate: u32) -> Self {
        Self {
            device_id,
            processing: ProcessingConstraints::enabled(),
            sample_rate: Some(sample_rate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackReadyState {
    Live,
    Ended,
}

/// Snapshot of one audio track of an open stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub label: String,
    pub enabled: bool,
    pub ready_state: TrackReadyState,
}

impl TrackInfo {
    pub fn live(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: true,
            ready_state: TrackReadyState::Live,
        }
    }

    /// Enabled and still producing audio
    pub fn is_usable(&self) -> bool {
        self.enabled && self.ready_state == TrackReadyState::Live
    }
}

/// Encoder settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: AudioMimeType,
    /// Interval between emitted chunks
    pub timeslice: Duration,
    /// Target bitrate in bits per second
    pub bitrate: u32,
}

/// Encoder and track callbacks delivered to the session's event pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Encoded data for one time slice; may be empty
    Chunk(Vec<u8>),
    /// The track ended or the encoder failed
    FatalError(PlatformError),
    /// Final chunk delivered after a stop request
    Finalized,
}

pub type RecorderEvents = mpsc::UnboundedReceiver<RecorderEvent>;

/// Port for the platform's media device API
#[async_trait]
pub trait MediaDevices: Send + Sync + 'static {
    type Stream: MediaStream;

    /// Whether the platform exposes a media device API at all
    fn is_supported(&self) -> bool;

    /// List all media devices currently visible to the process.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError>;

    /// Acquire a live audio stream matching the constraints.
    ///
    /// The returned stream holds OS handles until [`MediaStream::stop_tracks`]
    /// is called.
    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Self::Stream, PlatformError>;
}

/// Port for one acquired audio stream
pub trait MediaStream: Send + 'static {
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Attach an encoder and begin emitting events.
    fn start_recorder(&mut self, options: &RecorderOptions) -> Result<RecorderEvents, PlatformError>;

    /// Ask the encoder to emit its last chunk followed by `Finalized`.
    fn request_stop(&mut self) -> Result<(), PlatformError>;

    /// Stop every track and release the device. Idempotent.
    fn stop_tracks(&mut self) -> Result<(), PlatformError>;
}
