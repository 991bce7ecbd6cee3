//! Transport stream error types.

use thiserror::Error;

/// Errors raised while parsing or generating MPEG-TS data.
#[derive(Error, Debug)]
pub enum TsError {
    /// Invalid sync byte (expected 0x47).
    #[error("invalid sync byte: expected 0x47, got 0x{0:02X}")]
    InvalidSyncByte(u8),

    /// Packet shorter than 188 bytes.
    #[error("packet too short: expected 188 bytes, got {0}")]
    PacketTooShort(usize),

    /// Invalid adaptation field.
    #[error("invalid adaptation field: {0}")]
    InvalidAdaptationField(String),

    /// Invalid PSI section.
    #[error("invalid PSI section: {0}")]
    InvalidSection(String),

    /// Invalid PES packet.
    #[error("invalid PES packet: {0}")]
    InvalidPes(String),

    /// PSI section CRC mismatch.
    #[error("section CRC mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    CrcMismatch {
        /// CRC stored in the section.
        expected: u32,
        /// CRC computed over the section body.
        actual: u32,
    },

    /// PES written for a PID that was never declared.
    #[error("no elementary stream declared on PID {0}")]
    UndeclaredPid(u16),

    /// The input byte stream ended.
    #[error("transport stream ended")]
    EndOfStream,

    /// Read failure on the input byte stream.
    #[error("transport stream read failed")]
    Io(#[from] std::io::Error),
}

impl TsError {
    pub fn invalid_section(msg: impl Into<String>) -> Self {
        TsError::InvalidSection(msg.into())
    }

    pub fn invalid_pes(msg: impl Into<String>) -> Self {
        TsError::InvalidPes(msg.into())
    }
}

/// Result type for transport stream operations.
pub type Result<T> = std::result::Result<T, TsError>;
