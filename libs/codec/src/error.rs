//! Protocol-level errors for ASOA frame processing
//!
//! Each variant carries enough context to tell from a log line alone what
//! was wrong with the frame and where.

use thiserror::Error;

/// Frame and payload codec errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Buffer is too small to contain the expected structure
    #[error("Message too small: need {need} bytes, got {got} (context: {context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Frame magic did not match "ASOA"
    #[error("Invalid magic: expected {expected:#010x}, got {actual:#010x} (indicates: {diagnosis})")]
    InvalidMagic {
        expected: u32,
        actual: u32,
        diagnosis: String,
    },

    /// Message type byte does not map to a known message type
    #[error("Unknown message type {value:#04x}: known types are 0x01-0x06 and 0x10-0x12")]
    UnknownMessageType { value: u8 },

    /// Declared payload length exceeds the bytes actually present
    #[error("Payload length mismatch: header declares {declared} bytes, frame carries {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// Frame checksum does not match the recomputed value
    #[error("Checksum mismatch: expected {expected:#010x}, calculated {calculated:#010x} (frame: {frame_size} bytes, cause: {likely_cause})")]
    ChecksumMismatch {
        expected: u32,
        calculated: u32,
        frame_size: usize,
        likely_cause: String,
    },

    /// A field required by the schema is absent
    #[error("Missing field '{field}' in ucdr payload")]
    MissingField { field: String },

    /// Value supplied for encoding does not match the schema type
    #[error("Type mismatch for field '{field}': schema expects {expected}")]
    ValueTypeMismatch { field: String, expected: String },

    /// String does not fit in a 32-bit length prefix
    #[error("String field '{field}' too long: {len} bytes")]
    StringTooLong { field: String, len: usize },
}

impl ProtocolError {
    /// Create MessageTooSmall error with diagnostic context
    pub fn message_too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::MessageTooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    /// Create InvalidMagic error, guessing at what produced the bad bytes
    pub fn invalid_magic(expected: u32, actual: u32) -> Self {
        let diagnosis = match actual {
            0x0000_0000 => "uninitialized buffer",
            0xFFFF_FFFF => "corrupted buffer",
            _ if actual.swap_bytes() == expected => "byte order (endianness) mismatch",
            _ => "not an ASOA frame or corrupted magic",
        };

        Self::InvalidMagic {
            expected,
            actual,
            diagnosis: diagnosis.to_string(),
        }
    }

    /// Create ChecksumMismatch error with diagnostic context
    pub fn checksum_mismatch(expected: u32, calculated: u32, frame_size: usize) -> Self {
        let likely_cause = if expected == 0 {
            "frame built without checksum calculation"
        } else {
            "frame edited without recomputation or corrupted in transit"
        };

        Self::ChecksumMismatch {
            expected,
            calculated,
            frame_size,
            likely_cause: likely_cause.to_string(),
        }
    }

    /// True for errors that mean the bytes are not a well-formed frame
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::MessageTooSmall { .. }
                | Self::InvalidMagic { .. }
                | Self::UnknownMessageType { .. }
                | Self::PayloadLengthMismatch { .. }
        )
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
