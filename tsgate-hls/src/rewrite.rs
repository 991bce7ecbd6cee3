//! MPEG-1 audio to AAC rewrite path.
//!
//! HLS does not permit MPEG-1 audio, so when the upstream PMT declares a
//! Layer II elementary stream the gateway transcodes it in place: same PID,
//! stream type rewritten to ADTS AAC, payloads decoded to PCM and re-encoded
//! in small batches so the output stays aligned with the source clock.

use crate::error::{HlsError, Result};

use tsgate_audio::{AacEncoder, Mp2Decoder};
use tsgate_ts::reader::PesUnit;
use tsgate_ts::writer::{EsDecl, TsWriter};
use tsgate_ts::{PesTimestamp, StreamId, StreamType};

use tracing::debug;

/// AAC target bit rate for rewritten audio.
const AAC_BIT_RATE: u32 = 128_000;

/// Mini-batch flush boundary in 90 kHz ticks (100 ms).
///
/// Layer II frames are ~24 ms and AAC frames ~21 ms; batching a few of them
/// per output PES produces coherent ADTS runs without starving the stream.
const FLUSH_INTERVAL: i64 = 9_000;

/// Per-session state of the audio rewrite.
///
/// Lives inside the segment builder because PCM and the anchor timestamp
/// must survive across segment boundaries.
pub struct AudioRewriter {
    pid: u16,
    decoder: Mp2Decoder,
    /// Constructed lazily at the first flush, once the decoder has seen
    /// enough input to report sample rate and channel count.
    encoder: Option<AacEncoder>,
    pcm: Vec<i16>,
    /// PTS of the earliest undrained audio sample.
    anchor: Option<PesTimestamp>,
}

impl AudioRewriter {
    pub fn new(pid: u16) -> Result<Self> {
        Ok(Self {
            pid,
            decoder: Mp2Decoder::new()?,
            encoder: None,
            pcm: Vec::with_capacity(16 * 1024),
            anchor: None,
        })
    }

    /// PID of the stream being rewritten.
    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// The declaration advertised to the writer in place of the upstream one.
    pub fn declaration(&self) -> EsDecl {
        EsDecl::new(self.pid, StreamType::AacAdts as u8)
    }

    /// Process one incoming audio PES payload.
    ///
    /// Decoded PCM accumulates under the anchor timestamp; once the incoming
    /// PTS runs more than 100 ms past the anchor, the batch is encoded and
    /// emitted as a single PES with PTS = anchor.
    pub fn handle_pes(&mut self, unit: &PesUnit, writer: &mut TsWriter) -> Result<()> {
        let pts = unit.pts.ok_or(HlsError::MissingPts(unit.pid))?;

        if self.anchor.is_none() {
            self.anchor = Some(pts);
        }

        self.decoder.push(&unit.payload);
        while let Some(samples) = self.decoder.decode()? {
            self.pcm.extend_from_slice(&samples);
        }

        if let Some(anchor) = self.anchor {
            if pts.wrapping_delta(anchor) > FLUSH_INTERVAL {
                self.flush(writer)?;
            }
        }

        Ok(())
    }

    /// Encode and emit all accumulated PCM with the current anchor PTS.
    ///
    /// Called on the 100 ms batch boundary and again when the builder closes
    /// a segment. Resets the anchor either way.
    pub fn flush(&mut self, writer: &mut TsWriter) -> Result<()> {
        let anchor = match self.anchor.take() {
            Some(anchor) => anchor,
            None => return Ok(()),
        };
        if self.pcm.is_empty() {
            return Ok(());
        }

        if self.encoder.is_none() {
            // both are known here: pcm is non-empty, so a decode succeeded
            let sample_rate = self.decoder.sample_rate().unwrap_or(48_000);
            let channels = self.decoder.channels().unwrap_or(2);
            debug!(pid = self.pid, sample_rate, channels, "initializing AAC encoder");
            self.encoder = Some(AacEncoder::new(sample_rate, channels, AAC_BIT_RATE)?);
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Ok(());
        };

        let mut adts = Vec::new();
        encoder.encode(&self.pcm, &mut adts)?;
        self.pcm.clear();

        if adts.is_empty() {
            // less than one AAC frame accumulated; it stays in the encoder
            return Ok(());
        }

        writer.write_pes(
            self.pid,
            &PesUnit {
                pid: self.pid,
                stream_id: StreamId::AUDIO_BASE,
                pts: Some(anchor),
                dts: None,
                payload: adts,
            },
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_rewrites_stream_type() {
        let rewriter = AudioRewriter::new(257).unwrap();
        let decl = rewriter.declaration();
        assert_eq!(decl.pid, 257);
        assert_eq!(decl.stream_type, StreamType::AacAdts as u8);
    }

    #[test]
    fn test_missing_pts_is_fatal() {
        let mut rewriter = AudioRewriter::new(257).unwrap();
        let mut writer = TsWriter::new();
        let unit = PesUnit {
            pid: 257,
            stream_id: StreamId::AUDIO_BASE,
            pts: None,
            dts: None,
            payload: vec![0; 32],
        };
        assert!(matches!(
            rewriter.handle_pes(&unit, &mut writer),
            Err(HlsError::MissingPts(257))
        ));
    }

    #[test]
    fn test_undecodable_payload_emits_nothing() {
        let mut rewriter = AudioRewriter::new(257).unwrap();
        let mut writer = TsWriter::new();
        writer.add_stream(rewriter.declaration());

        for i in 0..20u64 {
            let unit = PesUnit {
                pid: 257,
                stream_id: StreamId::AUDIO_BASE,
                pts: Some(PesTimestamp::new(i * 2_160)), // 24 ms apart
                dts: None,
                payload: vec![0u8; 576],
            };
            rewriter.handle_pes(&unit, &mut writer).unwrap();
        }
        rewriter.flush(&mut writer).unwrap();

        // no PCM ever decoded, so nothing was written
        assert_eq!(writer.buffered(), 0);
    }

    #[test]
    fn test_flush_without_anchor_is_a_no_op() {
        let mut rewriter = AudioRewriter::new(257).unwrap();
        let mut writer = TsWriter::new();
        rewriter.flush(&mut writer).unwrap();
        assert_eq!(writer.buffered(), 0);
    }
}
