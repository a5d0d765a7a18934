//! Streaming Opus encoder writing an Ogg bitstream
//!
//! Settings:
//! - Sample rate: 48kHz (Opus native rate)
//! - Channels: Mono
//! - Application: VOIP (optimized for speech)
//! - Frames: 20ms
//!
//! Bytes are handed out in segments that always end on an Ogg page
//! boundary, so concatenating every segment in order yields one valid
//! `.ogg` file. The first non-empty segment carries the Opus headers.

use std::mem;

use ogg::writing::{PacketWriteEndInfo, PacketWriter};
use thiserror::Error;

/// Opus always decodes at 48kHz; input is resampled to match
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Opus frame size in samples (20ms at 48kHz)
pub const FRAME_SIZE: usize = 960;

/// Encoder lookahead at 48kHz, advertised as pre-skip
const PRE_SKIP: u16 = 312;

const MAX_PACKET_SIZE: usize = 4000;

/// Encoding errors
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Opus encoder setup failed: {0}")]
    Setup(String),

    #[error("Opus encoding failed: {0}")]
    OpusEncode(String),

    #[error("Failed to write OGG packet: {0}")]
    OggWrite(String),

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Incremental Ogg/Opus encoder for mono f32 PCM at 48kHz
pub struct OggOpusEncoder {
    encoder: opus::Encoder,
    writer: PacketWriter<'static, Vec<u8>>,
    serial: u32,
    /// Granule of the last encoded frame, counted from the pre-skip
    granule_pos: u64,
    /// Samples waiting for a full frame
    pcm: Vec<f32>,
    /// Last encoded packet, held back until we know how to end its page
    held: Option<(Vec<u8>, u64)>,
    headers_written: bool,
    ended: bool,
}

impl OggOpusEncoder {
    pub fn new(bitrate: u32) -> Result<Self, EncodingError> {
        let setup = |e: opus::Error| EncodingError::Setup(e.to_string());
        let mut encoder = opus::Encoder::new(
            OPUS_SAMPLE_RATE,
            opus::Channels::Mono,
            opus::Application::Voip,
        )
        .map_err(setup)?;
        let bitrate = i32::try_from(bitrate).map_err(|_| {
            EncodingError::Setup(format!("bitrate {} out of range", bitrate))
        })?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(bitrate))
            .map_err(setup)?;
        encoder.set_vbr(true).map_err(setup)?;
        encoder.set_inband_fec(true).map_err(setup)?;

        Ok(Self {
            encoder,
            writer: PacketWriter::new(Vec::new()),
            serial: rand_serial(),
            granule_pos: u64::from(PRE_SKIP),
            pcm: Vec::with_capacity(FRAME_SIZE * 2),
            held: None,
            headers_written: false,
            ended: false,
        })
    }

    /// Queue PCM samples, encoding every complete frame.
    pub fn push(&mut self, samples: &[f32]) -> Result<(), EncodingError> {
        self.pcm.extend_from_slice(samples);
        let whole = self.pcm.len() / FRAME_SIZE * FRAME_SIZE;
        if whole == 0 {
            return Ok(());
        }
        let frames: Vec<f32> = self.pcm.drain(..whole).collect();
        for frame in frames.chunks(FRAME_SIZE) {
            self.encode_frame(frame)?;
        }
        Ok(())
    }

    /// Close the current Ogg page and return every byte written since the
    /// last segment. Empty when nothing was encoded in between.
    pub fn take_segment(&mut self) -> Result<Vec<u8>, EncodingError> {
        if let Some((packet, granule)) = self.held.take() {
            self.write(packet, PacketWriteEndInfo::EndPage, granule)?;
        }
        Ok(mem::take(self.writer.inner_mut()))
    }

    /// Encode what is left (zero-padded to a frame), end the stream and
    /// return the final segment.
    pub fn finish(&mut self) -> Result<Vec<u8>, EncodingError> {
        if self.ended {
            return Ok(Vec::new());
        }
        if !self.pcm.is_empty() {
            let mut frame = mem::take(&mut self.pcm);
            frame.resize(FRAME_SIZE, 0.0);
            self.encode_frame(&frame)?;
        }
        // Last page was already closed by a segment; end-of-stream needs a packet
        if self.held.is_none() && self.headers_written {
            self.encode_frame(&[0.0; FRAME_SIZE])?;
        }
        if let Some((packet, granule)) = self.held.take() {
            self.write(packet, PacketWriteEndInfo::EndStream, granule)?;
            self.ended = true;
        }
        Ok(mem::take(self.writer.inner_mut()))
    }

    fn encode_frame(&mut self, frame: &[f32]) -> Result<(), EncodingError> {
        self.write_headers()?;

        let mut packet = vec![0u8; MAX_PACKET_SIZE];
        let len = self
            .encoder
            .encode_float(frame, &mut packet)
            .map_err(|e| EncodingError::OpusEncode(e.to_string()))?;
        packet.truncate(len);
        self.granule_pos += FRAME_SIZE as u64;

        if let Some((previous, granule)) = self.held.replace((packet, self.granule_pos)) {
            self.write(previous, PacketWriteEndInfo::NormalPacket, granule)?;
        }
        Ok(())
    }

    /// Write Opus identification and comment headers once
    fn write_headers(&mut self) -> Result<(), EncodingError> {
        if self.headers_written {
            return Ok(());
        }
        self.headers_written = true;

        let mut id_header = Vec::with_capacity(19);
        id_header.extend_from_slice(b"OpusHead");
        id_header.push(1); // Version
        id_header.push(1); // Channel count (mono)
        id_header.extend_from_slice(&PRE_SKIP.to_le_bytes());
        id_header.extend_from_slice(&OPUS_SAMPLE_RATE.to_le_bytes());
        id_header.extend_from_slice(&0i16.to_le_bytes()); // Output gain
        id_header.push(0); // Channel mapping family
        self.write(id_header, PacketWriteEndInfo::EndPage, 0)?;

        let mut comment_header = Vec::new();
        comment_header.extend_from_slice(b"OpusTags");
        let vendor = b"smart-memo";
        comment_header.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        comment_header.extend_from_slice(vendor);
        comment_header.extend_from_slice(&0u32.to_le_bytes()); // No user comments
        self.write(comment_header, PacketWriteEndInfo::EndPage, 0)
    }

    fn write(
        &mut self,
        packet: Vec<u8>,
        end: PacketWriteEndInfo,
        granule: u64,
    ) -> Result<(), EncodingError> {
        self.writer
            .write_packet(packet, self.serial, end, granule)
            .map_err(|e| EncodingError::OggWrite(e.to_string()))
    }
}

/// Generate a pseudo-random serial number for the Ogg stream
fn rand_serial() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (duration.as_secs() as u32) ^ duration.subsec_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(ms: usize) -> Vec<f32> {
        vec![0.0; OPUS_SAMPLE_RATE as usize * ms / 1000]
    }

    /// Packet count, last page granule, and whether the stream was ended
    fn read_stream(file: Vec<u8>) -> (usize, u64, bool) {
        let mut reader = ogg::PacketReader::new(std::io::Cursor::new(file));
        let mut packets = 0;
        let mut last_granule = 0;
        let mut saw_end = false;
        while let Some(packet) = reader.read_packet().unwrap() {
            packets += 1;
            last_granule = packet.absgp_page();
            saw_end = packet.last_in_stream();
        }
        (packets, last_granule, saw_end)
    }

    #[test]
    fn nothing_encoded_yields_empty_segments() {
        let mut encoder = OggOpusEncoder::new(32_000).unwrap();
        assert!(encoder.take_segment().unwrap().is_empty());
        assert!(encoder.finish().unwrap().is_empty());
    }

    #[test]
    fn first_segment_carries_headers() {
        let mut encoder = OggOpusEncoder::new(32_000).unwrap();
        encoder.push(&silence(1000)).unwrap();
        let first = encoder.take_segment().unwrap();
        assert!(first.starts_with(b"OggS"));
        assert!(first.windows(8).any(|w| w == b"OpusHead"));

        encoder.push(&silence(1000)).unwrap();
        let second = encoder.take_segment().unwrap();
        assert!(second.starts_with(b"OggS"));
        assert!(!second.windows(8).any(|w| w == b"OpusHead"));
    }

    #[test]
    fn partial_frame_is_padded_on_finish() {
        let mut encoder = OggOpusEncoder::new(32_000).unwrap();
        encoder.push(&silence(5)).unwrap();
        assert!(encoder.take_segment().unwrap().is_empty());
        let last = encoder.finish().unwrap();
        assert!(last.starts_with(b"OggS"));
    }

    #[test]
    fn concatenated_segments_parse_as_one_stream() {
        let mut encoder = OggOpusEncoder::new(24_000).unwrap();
        let mut file = Vec::new();
        for _ in 0..3 {
            encoder.push(&silence(1000)).unwrap();
            file.extend(encoder.take_segment().unwrap());
        }
        encoder.push(&silence(300)).unwrap();
        file.extend(encoder.finish().unwrap());

        let (packets, last_granule, saw_end) = read_stream(file);
        // 2 headers + 150 + 15 audio frames
        assert_eq!(packets, 2 + 150 + 15);
        assert_eq!(last_granule, u64::from(PRE_SKIP) + 165 * FRAME_SIZE as u64);
        assert!(saw_end);
    }

    #[test]
    fn finish_after_segment_still_ends_stream() {
        let mut encoder = OggOpusEncoder::new(24_000).unwrap();
        encoder.push(&silence(1000)).unwrap();
        let mut file = encoder.take_segment().unwrap();
        let last = encoder.finish().unwrap();
        assert!(last.starts_with(b"OggS"));
        file.extend(last);

        let (packets, last_granule, saw_end) = read_stream(file);
        // One silent frame carries the end-of-stream flag
        assert_eq!(packets, 2 + 50 + 1);
        assert_eq!(last_granule, u64::from(PRE_SKIP) + 51 * FRAME_SIZE as u64);
        assert!(saw_end);

        assert!(encoder.finish().unwrap().is_empty());
    }

    #[test]
    fn first_audio_granule_includes_pre_skip() {
        let mut encoder = OggOpusEncoder::new(24_000).unwrap();
        encoder.push(&silence(20)).unwrap();
        let (_, last_granule, _) = read_stream(encoder.finish().unwrap());
        assert_eq!(last_granule, u64::from(PRE_SKIP) + FRAME_SIZE as u64);
    }

    #[test]
    fn frame_size_is_20ms() {
        assert_eq!(FRAME_SIZE as f32 / OPUS_SAMPLE_RATE as f32 * 1000.0, 20.0);
    }
}
