//! Input devices and their availability

mod descriptor;
mod status;

pub use descriptor::{DeviceDescriptor, DeviceKind};
pub use status::MicrophoneStatus;
