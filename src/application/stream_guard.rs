//! Scoped ownership of an acquired media stream

use tracing::{debug, warn};

use super::ports::MediaStream;

/// Owns a stream and stops its tracks when dropped, unless it was already
/// released explicitly.
pub struct StreamGuard<S: MediaStream> {
    stream: S,
    released: bool,
}

impl<S: MediaStream> StreamGuard<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            released: false,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Stop all tracks now. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.stream.stop_tracks() {
            Ok(()) => debug!("Released media stream"),
            Err(e) => warn!(error = %e, "Failed to stop media tracks"),
        }
    }
}

impl<S: MediaStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}
