//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod config;
pub mod media;

// Re-export common types
pub use config::ConfigStore;
pub use media::{
    MediaDevices, MediaStream, PlatformError, PlatformErrorName, ProcessingConstraints,
    RecorderEvent, RecorderEvents, RecorderOptions, StreamConstraints, TrackInfo,
    TrackReadyState,
};
