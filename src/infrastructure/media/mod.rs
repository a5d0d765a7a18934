//! Media infrastructure module
//!
//! Captures microphone audio with cpal, resamples it with rubato and
//! encodes it to Ogg/Opus in fixed time slices.

mod cpal_devices;
mod encoder;
mod resample;
mod segment;

pub use cpal_devices::{CpalMediaDevices, CpalStream};
pub use encoder::{EncodingError, OggOpusEncoder, FRAME_SIZE, OPUS_SAMPLE_RATE};
pub use resample::StreamResampler;
pub use segment::SegmentRecorder;
