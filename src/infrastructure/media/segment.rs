//! Time-sliced encoding of captured PCM

use std::time::{Duration, Instant};

use super::encoder::{EncodingError, OggOpusEncoder};
use super::resample::StreamResampler;

/// Resamples and encodes device audio, cutting the output into one
/// segment per time slice.
pub struct SegmentRecorder {
    resampler: StreamResampler,
    encoder: OggOpusEncoder,
    timeslice: Duration,
    segment_started: Instant,
}

impl SegmentRecorder {
    pub fn new(source_rate: u32, bitrate: u32, timeslice: Duration) -> Result<Self, EncodingError> {
        Ok(Self {
            resampler: StreamResampler::new(source_rate)?,
            encoder: OggOpusEncoder::new(bitrate)?,
            timeslice,
            segment_started: Instant::now(),
        })
    }

    pub fn push(&mut self, samples: &[f32]) -> Result<(), EncodingError> {
        let resampled = self.resampler.process(samples)?;
        self.encoder.push(&resampled)
    }

    pub fn segment_due(&self, now: Instant) -> bool {
        now.duration_since(self.segment_started) >= self.timeslice
    }

    /// Cut the current segment. May be empty if no full frame was encoded.
    pub fn take_segment(&mut self) -> Result<Vec<u8>, EncodingError> {
        self.segment_started = Instant::now();
        self.encoder.take_segment()
    }

    /// Encode any buffered audio and return the closing segment.
    pub fn finish(mut self) -> Result<Vec<u8>, EncodingError> {
        let tail = self.resampler.flush()?;
        self.encoder.push(&tail)?;
        self.encoder.finish()
    }
}
