//! Incremental resampling of captured PCM to the Opus rate

use rubato::{FftFixedIn, Resampler};

use super::encoder::{EncodingError, OPUS_SAMPLE_RATE};

/// Input chunk size fed to the FFT resampler
const CHUNK_SIZE: usize = 1024;

/// Converts mono f32 audio from the device rate to 48kHz, buffering input
/// until the resampler has a full chunk.
pub struct StreamResampler {
    resampler: Option<FftFixedIn<f32>>,
    source_rate: u32,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(source_rate: u32) -> Result<Self, EncodingError> {
        let resampler = if source_rate == OPUS_SAMPLE_RATE {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(
                    source_rate as usize,
                    OPUS_SAMPLE_RATE as usize,
                    CHUNK_SIZE,
                    2, // Sub-chunks
                    1, // Mono
                )
                .map_err(|e| EncodingError::Resample(format!("init failed: {}", e)))?,
            )
        };
        Ok(Self {
            resampler,
            source_rate,
            pending: Vec::new(),
        })
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Resample as much of the buffered input as fills whole chunks.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, EncodingError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };
        self.pending.extend_from_slice(samples);

        let mut output = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<Vec<f32>> = vec![self.pending.drain(..needed).collect()];
            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| EncodingError::Resample(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
        }
        Ok(output)
    }

    /// Resample whatever input is left, zero-padding the last chunk and
    /// trimming the padding back off the output.
    pub fn flush(&mut self) -> Result<Vec<f32>, EncodingError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        let remaining = self.pending.len();
        let mut padded = std::mem::take(&mut self.pending);
        padded.resize(resampler.input_frames_next(), 0.0);
        let chunk = vec![padded];
        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| EncodingError::Resample(e.to_string()))?;

        let ratio = OPUS_SAMPLE_RATE as f64 / self.source_rate as f64;
        let keep = ((remaining as f64 * ratio).ceil() as usize).min(resampled[0].len());
        Ok(resampled[0][..keep].to_vec())
    }
}
