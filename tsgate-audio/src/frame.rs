//! MPEG audio frame headers.
//!
//! The decoder receives MPEG-1 audio as a bare byte stream inside PES
//! payloads, so it has to find and size frames itself before handing them to
//! the codec. This module knows just enough of ISO/IEC 11172-3 framing to do
//! that: sync search, header fields, and the bitrate/sample-rate tables that
//! determine the frame length.

use crate::error::{AudioError, Result};

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg25,
    Reserved,
    Mpeg2,
    Mpeg1,
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    Reserved,
    Layer3,
    Layer2,
    Layer1,
}

/// Channel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    pub fn channels(&self) -> u16 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Parsed MPEG audio frame header (4 bytes).
#[derive(Debug, Clone)]
pub struct MpaFrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    pub crc_protected: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: bool,
    pub channel_mode: ChannelMode,
}

impl MpaFrameHeader {
    /// Parse a frame header and reject values that cannot size a frame
    /// (free-format bitrate, reserved indices).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(AudioError::InvalidFrame("header too short".into()));
        }

        // 11-bit sync word
        if data[0] != 0xFF || (data[1] & 0xE0) != 0xE0 {
            return Err(AudioError::InvalidFrame("bad sync word".into()));
        }

        let version = match (data[1] >> 3) & 3 {
            0 => MpegVersion::Mpeg25,
            1 => MpegVersion::Reserved,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => unreachable!(),
        };
        let layer = match (data[1] >> 1) & 3 {
            0 => MpegLayer::Reserved,
            1 => MpegLayer::Layer3,
            2 => MpegLayer::Layer2,
            3 => MpegLayer::Layer1,
            _ => unreachable!(),
        };

        if version == MpegVersion::Reserved || layer == MpegLayer::Reserved {
            return Err(AudioError::InvalidFrame("reserved version or layer".into()));
        }

        let bitrate_index = (data[2] >> 4) & 0xF;
        let sample_rate_index = (data[2] >> 2) & 3;

        if bitrate_index == 0 || bitrate_index == 15 {
            return Err(AudioError::InvalidFrame("unsupported bitrate index".into()));
        }
        if sample_rate_index == 3 {
            return Err(AudioError::InvalidFrame("reserved sample rate index".into()));
        }

        let padding = (data[2] >> 1) & 1 == 1;
        let channel_mode = match (data[3] >> 6) & 3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            3 => ChannelMode::Mono,
            _ => unreachable!(),
        };

        Ok(Self {
            version,
            layer,
            crc_protected: (data[1] & 1) == 0,
            bitrate_index,
            sample_rate_index,
            padding,
            channel_mode,
        })
    }

    /// Bitrate in bits per second.
    pub fn bitrate(&self) -> u32 {
        const V1_L1: [u32; 16] = [
            0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0,
        ];
        const V1_L2: [u32; 16] = [
            0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0,
        ];
        const V1_L3: [u32; 16] = [
            0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
        ];
        const V2_L1: [u32; 16] = [
            0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0,
        ];
        const V2_L23: [u32; 16] = [
            0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
        ];

        let table = match (self.version, self.layer) {
            (MpegVersion::Mpeg1, MpegLayer::Layer1) => &V1_L1,
            (MpegVersion::Mpeg1, MpegLayer::Layer2) => &V1_L2,
            (MpegVersion::Mpeg1, _) => &V1_L3,
            (_, MpegLayer::Layer1) => &V2_L1,
            _ => &V2_L23,
        };

        table[self.bitrate_index as usize] * 1000
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        const RATES: [[u32; 3]; 3] = [
            [44_100, 48_000, 32_000], // MPEG-1
            [22_050, 24_000, 16_000], // MPEG-2
            [11_025, 12_000, 8_000],  // MPEG-2.5
        ];

        let version_idx = match self.version {
            MpegVersion::Mpeg1 => 0,
            MpegVersion::Mpeg2 => 1,
            _ => 2,
        };
        RATES[version_idx][self.sample_rate_index as usize]
    }

    /// PCM samples per frame per channel.
    pub fn samples_per_frame(&self) -> usize {
        match self.layer {
            MpegLayer::Layer1 => 384,
            MpegLayer::Layer2 => 1152,
            MpegLayer::Layer3 => match self.version {
                MpegVersion::Mpeg1 => 1152,
                _ => 576,
            },
            MpegLayer::Reserved => 0,
        }
    }

    /// Frame size in bytes, header included.
    pub fn frame_size(&self) -> usize {
        let bitrate = self.bitrate() as usize;
        let sample_rate = self.sample_rate() as usize;
        if bitrate == 0 || sample_rate == 0 {
            return 0;
        }

        let padding = usize::from(self.padding);
        match self.layer {
            MpegLayer::Layer1 => (12 * bitrate / sample_rate + padding) * 4,
            MpegLayer::Layer2 => 144 * bitrate / sample_rate + padding,
            MpegLayer::Layer3 => match self.version {
                MpegVersion::Mpeg1 => 144 * bitrate / sample_rate + padding,
                _ => 72 * bitrate / sample_rate + padding,
            },
            MpegLayer::Reserved => 0,
        }
    }
}

/// Find the next plausible frame header, returning its offset.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    for i in 0..data.len().saturating_sub(3) {
        if data[i] == 0xFF
            && (data[i + 1] & 0xE0) == 0xE0
            && MpaFrameHeader::parse(&data[i..]).is_ok()
        {
            return Some(i);
        }
    }
    None
}
