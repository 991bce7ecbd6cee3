//! # tsgate-audio
//!
//! The audio codec pair behind the gateway's MPEG-1 → AAC rewrite path:
//!
//! - [`Mp2Decoder`]: push raw MPEG-1 audio bytes, pull interleaved i16 PCM
//!   one frame at a time. Sample rate and channel count become available
//!   after the first successful decode.
//! - [`AacEncoder`]: interleaved i16 PCM in, ADTS frames out, at a fixed
//!   bit rate.
//!
//! Both are synchronous and allocation-light; the transmux pipeline calls
//! them inline from its producer loop.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;

pub use decoder::Mp2Decoder;
pub use encoder::AacEncoder;
pub use error::{AudioError, Result};
pub use frame::{find_sync, ChannelMode, MpaFrameHeader, MpegLayer, MpegVersion};
