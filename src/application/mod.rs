//! Application layer - Use cases and port interfaces
//!
//! Contains the capture use cases and trait definitions
//! for external system interactions.

pub mod capture;
pub mod controller;
pub mod ports;
pub mod prober;
pub mod status;
pub mod stream_guard;
pub mod timer;

// Re-export use cases
pub use capture::{CaptureConfig, CaptureSession};
pub use controller::{RecorderState, SessionController};
pub use prober::DeviceProber;
pub use status::classify;
