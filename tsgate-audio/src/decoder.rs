//! MPEG-1 audio decoder.
//!
//! Push-buffer wrapper around symphonia's MPEG audio decoder. Callers append
//! raw PES payload bytes with [`Mp2Decoder::push`] and drain decoded PCM one
//! frame at a time with [`Mp2Decoder::decode`]; framing (sync search and
//! frame sizing) happens here so the codec always sees whole frames.

use crate::error::{AudioError, Result};
use crate::frame::{find_sync, MpaFrameHeader};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_MP2};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::debug;

/// Streaming MPEG-1 Layer II decoder producing interleaved signed 16-bit PCM.
pub struct Mp2Decoder {
    buffer: Vec<u8>,
    inner: Box<dyn Decoder>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
}

impl Mp2Decoder {
    pub fn new() -> Result<Self> {
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_MP2);

        let inner = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AudioError::Decode(format!("decoder construction: {e}")))?;

        Ok(Self {
            buffer: Vec::with_capacity(16 * 1024),
            inner,
            sample_rate: None,
            channels: None,
        })
    }

    /// Append raw MPEG audio bytes to the input buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode the next buffered frame.
    ///
    /// Returns `None` when no complete frame is buffered yet. Frames the
    /// codec rejects are dropped and decoding continues with the next sync.
    pub fn decode(&mut self) -> Result<Option<Vec<i16>>> {
        loop {
            let start = match find_sync(&self.buffer) {
                Some(offset) => offset,
                None => {
                    // keep a potential partial header at the tail
                    let keep = self.buffer.len().min(3);
                    self.buffer.drain(..self.buffer.len() - keep);
                    return Ok(None);
                }
            };
            if start > 0 {
                debug!(skipped = start, "skipped bytes before audio sync");
                self.buffer.drain(..start);
            }

            let header = MpaFrameHeader::parse(&self.buffer)?;
            let frame_size = header.frame_size();
            if frame_size == 0 {
                self.buffer.drain(..1);
                continue;
            }
            if self.buffer.len() < frame_size {
                return Ok(None);
            }

            let frame: Vec<u8> = self.buffer.drain(..frame_size).collect();
            let packet = Packet::new_from_slice(0, 0, 0, &frame);

            match self.inner.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    self.sample_rate = Some(spec.rate);
                    self.channels = Some(spec.channels.count() as u16);

                    let mut pcm = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                    pcm.copy_interleaved_ref(decoded);
                    return Ok(Some(pcm.samples().to_vec()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(error = e, "dropping undecodable audio frame");
                    continue;
                }
                Err(e) => return Err(AudioError::Decode(e.to_string())),
            }
        }
    }

    /// Sample rate, known after the first successful decode.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Channel count, known after the first successful decode.
    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    /// Bytes currently waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_output_without_input() {
        let mut decoder = Mp2Decoder::new().unwrap();
        assert!(decoder.decode().unwrap().is_none());
        assert!(decoder.sample_rate().is_none());
        assert!(decoder.channels().is_none());
    }

    #[test]
    fn test_garbage_is_discarded() {
        let mut decoder = Mp2Decoder::new().unwrap();
        decoder.push(&[0x00; 4096]);
        assert!(decoder.decode().unwrap().is_none());
        // everything but a potential partial header got dropped
        assert!(decoder.buffered() <= 3);
    }

    #[test]
    fn test_partial_frame_waits_for_more_bytes() {
        let mut decoder = Mp2Decoder::new().unwrap();
        // valid Layer II header (48 kHz, 256 kbps -> 768-byte frame), short payload
        decoder.push(&[0xFF, 0xFD, 0xC4, 0x00]);
        decoder.push(&[0u8; 100]);
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.buffered(), 104);
    }
}
