//! Method parameters and signature matching.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

/// Type of a method parameter.
///
/// Only the three integer kinds have a wire tag. `Undefined` terminates a
/// declared signature early; `Blob` and `Binary` exist for method catalogs
/// shared with hosts that describe them, but no frame can carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamKind {
    Undefined = 0x00,
    U8 = 0x01,
    U16 = 0x02,
    U32 = 0x03,
    Blob = 0x07,
    Binary = 0x80,
}

impl ParamKind {
    /// Kind announced by a 4-bit wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x1 => Some(ParamKind::U8),
            0x2 => Some(ParamKind::U16),
            0x3 => Some(ParamKind::U32),
            _ => None,
        }
    }

    /// 4-bit wire tag, if the kind can be carried in a frame.
    pub fn tag(self) -> Option<u8> {
        match self {
            ParamKind::U8 => Some(0x1),
            ParamKind::U16 => Some(0x2),
            ParamKind::U32 => Some(0x3),
            _ => None,
        }
    }

    /// Number of big-endian value bytes following the tag.
    pub fn wire_width(self) -> Option<usize> {
        match self {
            ParamKind::U8 => Some(1),
            ParamKind::U16 => Some(2),
            ParamKind::U32 => Some(4),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamKind::Undefined => "undefined",
            ParamKind::U8 => "u8",
            ParamKind::U16 => "u16",
            ParamKind::U32 => "u32",
            ParamKind::Blob => "blob",
            ParamKind::Binary => "binary",
        }
    }
}

/// A received or outgoing parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    U8(u8),
    U16(u16),
    U32(u32),
    Blob(Bytes),
    Binary(Bytes),
}

impl Param {
    pub fn kind(&self) -> ParamKind {
        match self {
            Param::U8(_) => ParamKind::U8,
            Param::U16(_) => ParamKind::U16,
            Param::U32(_) => ParamKind::U32,
            Param::Blob(_) => ParamKind::Blob,
            Param::Binary(_) => ParamKind::Binary,
        }
    }

    /// Integer value widened to 32 bits; `None` for blob-like parameters.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Param::U8(value) => Some(u32::from(*value)),
            Param::U16(value) => Some(u32::from(*value)),
            Param::U32(value) => Some(*value),
            Param::Blob(_) | Param::Binary(_) => None,
        }
    }

    /// Decode a value of `kind` from exactly `kind.wire_width()` big-endian bytes.
    pub(crate) fn from_be_bytes(kind: ParamKind, bytes: &[u8]) -> Option<Self> {
        Some(match (kind, bytes) {
            (ParamKind::U8, [b0]) => Param::U8(*b0),
            (ParamKind::U16, [b0, b1]) => Param::U16(u16::from_be_bytes([*b0, *b1])),
            (ParamKind::U32, [b0, b1, b2, b3]) => {
                Param::U32(u32::from_be_bytes([*b0, *b1, *b2, *b3]))
            }
            _ => return None,
        })
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::U8(value) => write!(f, "u8:{value}"),
            Param::U16(value) => write!(f, "u16:{value}"),
            Param::U32(value) => write!(f, "u32:{value}"),
            Param::Blob(bytes) => write!(f, "blob:<{} bytes>", bytes.len()),
            Param::Binary(bytes) => write!(f, "binary:<{} bytes>", bytes.len()),
        }
    }
}

/// Parses `u8:N`, `u16:N` or `u32:N`, with `N` in decimal or `0x` hex.
impl FromStr for Param {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (kind, value) = input
            .split_once(':')
            .ok_or_else(|| format!("expected KIND:VALUE, got '{input}'"))?;
        let value = parse_integer(value).ok_or_else(|| format!("invalid number in '{input}'"))?;

        let out_of_range = || format!("value out of range for {kind} in '{input}'");
        match kind.to_ascii_lowercase().as_str() {
            "u8" => u8::try_from(value).map(Param::U8).map_err(|_| out_of_range()),
            "u16" => u16::try_from(value).map(Param::U16).map_err(|_| out_of_range()),
            "u32" => u32::try_from(value).map(Param::U32).map_err(|_| out_of_range()),
            other => Err(format!("unknown parameter kind '{other}' (use u8, u16 or u32)")),
        }
    }
}

fn parse_integer(text: &str) -> Option<u64> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

/// Signature with a single `UINT8` parameter (an output or input index).
pub const SINGLE_UINT8: &[ParamKind] = &[ParamKind::U8];

/// Signature of the built-in start-assertion method.
pub const START_ASSERTION_SIGNATURE: &[ParamKind] =
    &[ParamKind::U32, ParamKind::U32, ParamKind::U8, ParamKind::U8];

/// Check received parameters against a declared signature.
///
/// The kinds must agree one by one, and both lists must end together. A
/// `ParamKind::Undefined` in `declared` ends the signature at that point.
pub fn match_signature(received: &[Param], declared: &[ParamKind]) -> bool {
    let mut declared = declared
        .iter()
        .copied()
        .take_while(|kind| *kind != ParamKind::Undefined);
    let mut received = received.iter().map(Param::kind);

    loop {
        match (declared.next(), received.next()) {
            (None, None) => return true,
            (Some(expected), Some(actual)) if expected == actual => {}
            _ => return false,
        }
    }
}
