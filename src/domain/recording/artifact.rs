//! Finalized recording artifact

use std::fmt;
use std::time::Duration as StdDuration;

/// Container/codec of an encoded recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioMimeType {
    /// Opus in an Ogg container
    #[default]
    OggOpus,
    /// Opus in a WebM container
    WebmOpus,
}

impl AudioMimeType {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OggOpus => "audio/ogg;codecs=opus",
            Self::WebmOpus => "audio/webm;codecs=opus",
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::OggOpus => "ogg",
            Self::WebmOpus => "webm",
        }
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Encoded audio produced by a completed recording session.
///
/// Only built from a non-empty chunk sequence; the session hands it to
/// the caller and keeps no reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    data: Vec<u8>,
    mime_type: AudioMimeType,
    duration: StdDuration,
}

impl AudioArtifact {
    /// Concatenate encoded chunks in arrival order.
    ///
    /// Returns `None` when there is nothing to concatenate.
    pub fn from_chunks(
        chunks: Vec<Vec<u8>>,
        mime_type: AudioMimeType,
        duration: StdDuration,
    ) -> Option<Self> {
        if chunks.iter().all(|chunk| chunk.is_empty()) {
            return None;
        }
        Some(Self {
            data: chunks.concat(),
            mime_type,
            duration,
        })
    }

    /// Get the encoded bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> AudioMimeType {
        self.mime_type
    }

    /// Recorded duration
    pub fn duration(&self) -> StdDuration {
        self.duration
    }

    /// Recorded duration in fractional seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}
