use crate::param::ParamKind;
use crate::result::ErrorCode;

/// Errors that can occur while decoding, encoding or transporting frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The checksum over the frame did not leave a zero residue.
    #[error("checksum mismatch (residue 0x{residue:04x})")]
    Crc { residue: u16 },

    /// The length byte cannot describe a frame of the available bytes.
    #[error("invalid frame length {len} ({available} bytes available)")]
    InvalidLength { len: usize, available: usize },

    /// The frame does not fit in a frame buffer.
    #[error("frame too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },

    /// A parameter runs past the checksum.
    #[error("parameter {index} truncated (needs {needed} bytes, {available} left)")]
    Truncated {
        index: usize,
        needed: usize,
        available: usize,
    },

    /// A parameter carries a type tag with no wire encoding.
    #[error("parameter {index} has unknown type tag 0x{tag:x}")]
    UnknownTag { index: usize, tag: u8 },

    /// More parameters than the configured maximum.
    #[error("too many parameters ({count}, max {max})")]
    TooManyParams { count: usize, max: usize },

    /// The parameter kind cannot be carried in a frame.
    #[error("parameter kind {0:?} cannot be encoded on the wire")]
    UnsupportedKind(ParamKind),

    /// Method ids are 12 bits wide.
    #[error("method id 0x{0:x} out of range (max 0xfff)")]
    InvalidMethod(u16),

    /// A frame received as a response is neither an ACK nor a NACK.
    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Protocol error code reported to the host for a frame that failed to decode.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FrameError::Crc { .. } | FrameError::InvalidLength { .. } | FrameError::TooLong { .. } => {
                ErrorCode::Crc
            }
            FrameError::Truncated { .. }
            | FrameError::UnknownTag { .. }
            | FrameError::TooManyParams { .. }
            | FrameError::UnsupportedKind(_) => ErrorCode::Parameters,
            FrameError::InvalidMethod(_) => ErrorCode::Method,
            FrameError::InvalidResponse(_) | FrameError::Io(_) | FrameError::ConnectionClosed => {
                ErrorCode::Generic
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
