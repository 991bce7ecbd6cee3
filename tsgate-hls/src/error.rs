//! Pipeline error types.

use thiserror::Error;
use tsgate_audio::AudioError;
use tsgate_ts::TsError;

/// Errors that terminate a session's producer loop.
///
/// Every variant is fatal at session scope: the producer logs it, closes the
/// session, and the next viewer request resurrects the stream from its URL.
#[derive(Error, Debug)]
pub enum HlsError {
    /// Upstream HTTP request failed (connect, status, or mid-stream).
    #[error("upstream request failed")]
    Upstream(#[from] reqwest::Error),

    /// The transport stream ended or could not be parsed.
    #[error(transparent)]
    Ts(#[from] TsError),

    /// A PES packet arrived without a presentation timestamp. Segments are
    /// cut on PTS time, so a missing clock leaves nothing to cut on.
    #[error("PES packet on PID {0} has no PTS")]
    MissingPts(u16),

    /// Audio decode or encode failure on the rewrite path.
    #[error(transparent)]
    Codec(#[from] AudioError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, HlsError>;
