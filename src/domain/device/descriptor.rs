//! Device descriptor value object

use std::fmt;

use serde::Serialize;

/// Kind of media device reported by enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

impl DeviceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AudioInput => "audioinput",
            Self::AudioOutput => "audiooutput",
            Self::VideoInput => "videoinput",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of one enumerated device.
///
/// Never cached beyond the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn audio_input(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::AudioInput,
        }
    }

    pub fn is_audio_input(&self) -> bool {
        self.kind == DeviceKind::AudioInput
    }

    /// Label to show a user; falls back to the id for unlabeled devices
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_input_constructor() {
        let device = DeviceDescriptor::audio_input("hw:0", "Built-in Microphone");
        assert!(device.is_audio_input());
        assert_eq!(device.kind.as_str(), "audioinput");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let device = DeviceDescriptor::audio_input("hw:1", "  ");
        assert_eq!(device.display_name(), "hw:1");
    }
}
