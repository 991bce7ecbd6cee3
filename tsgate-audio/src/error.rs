//! Audio codec error types.

use thiserror::Error;

/// Errors raised by the audio decode and encode paths.
#[derive(Error, Debug)]
pub enum AudioError {
    /// Malformed MPEG audio frame header.
    #[error("invalid MPEG audio frame: {0}")]
    InvalidFrame(String),

    /// The MPEG audio decoder rejected a frame.
    #[error("audio decode failed: {0}")]
    Decode(String),

    /// AAC encoder construction failed.
    #[error("AAC encoder init failed: {0}")]
    EncoderInit(String),

    /// AAC encoding failed.
    #[error("AAC encode failed: {0}")]
    Encode(String),
}

/// Result type for audio codec operations.
pub type Result<T> = std::result::Result<T, AudioError>;
