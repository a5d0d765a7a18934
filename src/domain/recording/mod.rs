//! Recording value objects

mod artifact;
mod duration;
mod elapsed;

pub use artifact::{AudioArtifact, AudioMimeType};
pub use duration::Duration;
pub use elapsed::format_elapsed;
