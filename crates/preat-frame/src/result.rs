/// Failure codes carried in a NACK frame.
///
/// Success is not a variant: a successful call is `Ok(())` and travels as the
/// fixed ACK frame (wire code `0x00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[repr(u8)]
pub enum ErrorCode {
    /// The frame checksum was wrong.
    #[error("frame checksum error")]
    Crc = 0x01,
    /// No method is registered under the requested id.
    #[error("method not found")]
    Method = 0x02,
    /// The parameters do not match the method signature.
    #[error("parameters do not match method signature")]
    Parameters = 0x03,
    /// An expected input fired before the assertion delay elapsed.
    #[error("input event occurred too early")]
    TooEarly = 0x04,
    /// Not every expected input fired before the assertion timeout.
    #[error("input events timed out")]
    Timeout = 0x05,
    /// The open assertion was executed before all its inputs were registered.
    #[error("assertion not fully defined")]
    Undefined = 0x06,
    /// An assertion was started while another one was still open.
    #[error("assertion already defined")]
    Redefined = 0x07,
    /// A method failed its own validation.
    #[error("generic method error")]
    Generic = 0xFF,
}

/// Result of executing a method.
pub type Outcome = std::result::Result<(), ErrorCode>;

impl ErrorCode {
    /// Numeric value on the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }

    /// Parse a non-zero wire code.
    pub fn from_wire(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => ErrorCode::Crc,
            0x02 => ErrorCode::Method,
            0x03 => ErrorCode::Parameters,
            0x04 => ErrorCode::TooEarly,
            0x05 => ErrorCode::Timeout,
            0x06 => ErrorCode::Undefined,
            0x07 => ErrorCode::Redefined,
            0xFF => ErrorCode::Generic,
            _ => return None,
        })
    }

    /// Stable lowercase name, used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Crc => "crc_error",
            ErrorCode::Method => "method_error",
            ErrorCode::Parameters => "parameters_error",
            ErrorCode::TooEarly => "too_early_error",
            ErrorCode::Timeout => "timeout_error",
            ErrorCode::Undefined => "undefined_error",
            ErrorCode::Redefined => "redefined_error",
            ErrorCode::Generic => "generic_error",
        }
    }
}

/// Wire code of an outcome (`0x00` for success).
pub fn wire_code(outcome: &Outcome) -> u8 {
    match outcome {
        Ok(()) => 0x00,
        Err(code) => code.wire(),
    }
}
