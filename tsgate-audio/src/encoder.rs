//! AAC-LC encoder with ADTS framing.
//!
//! Thin wrapper around the Fraunhofer FDK encoder. Input is interleaved
//! signed 16-bit PCM; output is a byte stream of self-contained ADTS frames
//! ready to drop into a PES payload.

use crate::error::{AudioError, Result};

use fdk_aac::enc::{BitRate, ChannelMode, Encoder as FdkEncoder, EncoderParams, Transport};

/// AAC encoder producing ADTS output.
pub struct AacEncoder {
    inner: FdkEncoder,
    sample_rate: u32,
    channels: u16,
    bitrate: u32,
    /// Sub-frame PCM remainder carried between encode calls.
    pending: Vec<i16>,
}

impl AacEncoder {
    /// Samples per channel per AAC frame.
    pub const FRAME_SAMPLES: usize = 1024;

    pub fn new(sample_rate: u32, channels: u16, bitrate: u32) -> Result<Self> {
        let channel_mode = match channels {
            1 => ChannelMode::Mono,
            2 => ChannelMode::Stereo,
            other => {
                return Err(AudioError::EncoderInit(format!(
                    "unsupported channel count {other}, only mono and stereo"
                )))
            }
        };

        let params = EncoderParams {
            bit_rate: BitRate::Cbr(bitrate),
            sample_rate,
            transport: Transport::Adts,
            channels: channel_mode,
        };

        let inner = FdkEncoder::new(params)
            .map_err(|e| AudioError::EncoderInit(format!("{e:?}")))?;

        Ok(Self {
            inner,
            sample_rate,
            channels,
            bitrate,
            pending: Vec::with_capacity(Self::FRAME_SAMPLES * channels as usize * 2),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bitrate(&self) -> u32 {
        self.bitrate
    }

    /// Encode interleaved PCM, appending ADTS frames to `out`.
    ///
    /// Whole 1024-sample frames are encoded; the remainder stays buffered for
    /// the next call so a live stream never gets padded with silence
    /// mid-flight.
    pub fn encode(&mut self, pcm: &[i16], out: &mut Vec<u8>) -> Result<()> {
        self.pending.extend_from_slice(pcm);

        let frame_len = Self::FRAME_SAMPLES * self.channels as usize;
        let mut output = vec![0u8; 768 * self.channels as usize];

        while self.pending.len() >= frame_len {
            let frame: Vec<i16> = self.pending.drain(..frame_len).collect();

            let info = self
                .inner
                .encode(&frame, &mut output)
                .map_err(|e| AudioError::Encode(format!("{e:?}")))?;

            if info.output_size > 0 {
                out.extend_from_slice(&output[..info.output_size]);
            }
        }

        Ok(())
    }

    /// Samples currently buffered below one frame.
    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsupported_channel_count() {
        assert!(matches!(
            AacEncoder::new(48_000, 6, 128_000),
            Err(AudioError::EncoderInit(_))
        ));
    }

    #[test]
    fn test_encode_buffers_subframe_remainder() {
        // FDK construction can fail where the native library is unavailable;
        // the buffering contract is only checkable when it is present.
        let Ok(mut encoder) = AacEncoder::new(48_000, 2, 128_000) else {
            return;
        };

        let mut out = Vec::new();
        // 1.5 frames of stereo silence
        let pcm = vec![0i16; AacEncoder::FRAME_SAMPLES * 3];
        encoder.encode(&pcm, &mut out).unwrap();
        assert_eq!(encoder.pending_samples(), AacEncoder::FRAME_SAMPLES);

        // the other half completes the second frame
        let pcm = vec![0i16; AacEncoder::FRAME_SAMPLES];
        encoder.encode(&pcm, &mut out).unwrap();
        assert_eq!(encoder.pending_samples(), 0);
    }
}
