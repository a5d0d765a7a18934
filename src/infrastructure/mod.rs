//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with the audio host and the filesystem.

pub mod config;
pub mod media;

// Re-export adapters
pub use config::XdgConfigStore;
pub use media::{CpalMediaDevices, CpalStream};
