//! Domain layer - Core capture model
//!
//! Contains value objects, the session state machine, and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod device;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use config::AppConfig;
pub use device::{DeviceDescriptor, DeviceKind, MicrophoneStatus};
pub use error::*;
pub use recording::{format_elapsed, AudioArtifact, AudioMimeType, Duration};
pub use session::{CaptureState, InvalidStateTransition, SessionMachine};
