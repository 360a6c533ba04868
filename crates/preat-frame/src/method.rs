//! Reserved method ids.
//!
//! Responses reuse the method field: `0x000` marks an acknowledgement and
//! `0x001` a failure report. Ids below `0x010` are reserved for built-in
//! methods; everything else is available to target-specific methods.

/// Method id of the success response.
pub const RESPONSE_ACK: u16 = 0x000;

/// Method id of the failure response.
pub const RESPONSE_NACK: u16 = 0x001;

/// Built-in: open an assertion `{UINT32 delay, UINT32 timeout, UINT8 inputs, UINT8 reserved}`.
pub const START_ASSERTION: u16 = 0x005;

/// Largest id representable in the 12-bit method field.
pub const MAX_METHOD_ID: u16 = 0x0FFF;

/// First id available for target-specific methods.
pub const USER_METHOD_START: u16 = 0x010;

/// Human-readable name for a method id.
pub fn method_name(id: u16) -> &'static str {
    match id {
        RESPONSE_ACK => "ACK",
        RESPONSE_NACK => "NACK",
        START_ASSERTION => "START_ASSERTION",
        0x002..=0x00F => "RESERVED",
        _ => "USER",
    }
}

/// Returns true if the id is in the reserved range.
pub fn is_reserved(id: u16) -> bool {
    id < USER_METHOD_START
}
