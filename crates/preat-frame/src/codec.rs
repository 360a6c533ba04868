use tracing::trace;

use crate::crc::Crc16;
use crate::error::{FrameError, Result};
use crate::method::RESPONSE_NACK;
use crate::param::{Param, ParamKind};
use crate::result::{wire_code, Outcome};

/// Size of a frame buffer; the longest frame a target accepts.
pub const FRAME_CAPACITY: usize = 64;

/// Smallest valid frame: length byte, two header bytes and the checksum.
pub const MIN_FRAME_LEN: usize = 5;

/// Length of the success response.
pub const ACK_LEN: usize = 5;

/// Length of the failure response.
pub const NACK_LEN: usize = 7;

/// Default upper bound on parameters per message (the count nibble allows 15).
pub const DEFAULT_MAX_PARAMS: usize = 16;

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum number of parameters accepted in one message. Default: 16.
    pub max_params: usize,
    /// Checksum parameters shared with the host.
    pub crc: Crc16,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_params: DEFAULT_MAX_PARAMS,
            crc: Crc16::DEFAULT,
        }
    }
}

/// Fixed-size frame storage.
///
/// Requests are decoded from it and the response is written back into the
/// same buffer, so it always has room for the failure frame.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    bytes: [u8; FRAME_CAPACITY],
}

impl FrameBuffer {
    /// An all-zero buffer.
    pub fn new() -> Self {
        Self {
            bytes: [0; FRAME_CAPACITY],
        }
    }

    /// Copy `data` into a fresh buffer.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > FRAME_CAPACITY {
            return Err(FrameError::TooLong {
                len: data.len(),
                max: FRAME_CAPACITY,
            });
        }
        let mut buf = Self::new();
        buf.bytes[..data.len()].copy_from_slice(data);
        Ok(buf)
    }

    /// Length announced by the first byte, clamped to the capacity.
    pub fn frame_len(&self) -> usize {
        usize::from(self.bytes[0]).min(FRAME_CAPACITY)
    }

    /// The frame currently held, as announced by its length byte.
    pub fn as_frame(&self) -> &[u8] {
        &self.bytes[..self.frame_len()]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_CAPACITY] {
        &self.bytes
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8; FRAME_CAPACITY] {
        &mut self.bytes
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameBuffer({:02x?})", self.as_frame())
    }
}

/// A decoded request.
///
/// Kept by the caller and refilled for every frame so that dispatch does not
/// allocate once the parameter vector has grown to its working size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// 12-bit method id.
    pub method: u16,
    /// Parameters in wire order.
    pub params: Vec<Param>,
}

impl Message {
    pub fn new(method: u16, params: Vec<Param>) -> Self {
        Self { method, params }
    }
}

/// Decode the frame at the start of `raw` into `message`.
///
/// The checksum is verified before any other field is examined. On error the
/// contents of `message` are unspecified.
///
/// Wire format:
/// ```text
/// ┌────────┬──────────────┬───────────┬──────────────────────────┬──────────┐
/// │ Len    │ Method (12b) │ Count (4b)│ Tags (2 per byte) + vals │ CRC (BE) │
/// │ 1 byte │ 2 bytes, shared          │ Len - 5 bytes            │ 2 bytes  │
/// └────────┴──────────────┴───────────┴──────────────────────────┴──────────┘
/// ```
pub fn decode_frame(raw: &[u8], config: &FrameConfig, message: &mut Message) -> Result<()> {
    let len = raw.first().copied().map(usize::from).unwrap_or(0);
    if len < MIN_FRAME_LEN || len > raw.len() {
        return Err(FrameError::InvalidLength {
            len,
            available: raw.len(),
        });
    }
    let frame = &raw[..len];

    let residue = config.crc.residue(frame);
    if residue != 0 {
        return Err(FrameError::Crc { residue });
    }

    message.method = (u16::from(frame[1]) << 4) | u16::from(frame[2] >> 4);
    let count = usize::from(frame[2] & 0x0F);
    if count > config.max_params {
        return Err(FrameError::TooManyParams {
            count,
            max: config.max_params,
        });
    }

    message.params.clear();
    let body = &frame[3..len - 2];
    let mut cursor = 0usize;
    let mut tags = 0u8;

    for index in 0..count {
        // Even parameters start a new tag byte; odd ones use its low nibble.
        let tag = if index % 2 == 0 {
            tags = *body.get(cursor).ok_or(FrameError::Truncated {
                index,
                needed: 1,
                available: 0,
            })?;
            cursor += 1;
            tags >> 4
        } else {
            tags & 0x0F
        };

        let kind = ParamKind::from_tag(tag).ok_or(FrameError::UnknownTag { index, tag })?;
        let width = kind.wire_width().unwrap_or(0);
        let available = body.len() - cursor;
        let value = body
            .get(cursor..cursor + width)
            .and_then(|bytes| Param::from_be_bytes(kind, bytes))
            .ok_or(FrameError::Truncated {
                index,
                needed: width,
                available,
            })?;
        cursor += width;
        message.params.push(value);
    }

    trace!(
        method = message.method,
        params = message.params.len(),
        "decoded frame"
    );
    Ok(())
}

/// Overwrite `buf` with the response for `outcome`.
///
/// Success becomes the 5-byte acknowledgement; failure the 7-byte frame
/// carrying the error code as a single `UINT8` parameter.
pub fn encode_response(buf: &mut FrameBuffer, outcome: &Outcome, crc: &Crc16) {
    let bytes = buf.as_mut_bytes();
    match outcome {
        Ok(()) => {
            bytes[..3].copy_from_slice(&[ACK_LEN as u8, 0x00, 0x00]);
            crc.append(bytes, 3);
        }
        Err(_) => {
            let [hi, lo] = ((RESPONSE_NACK << 4) | 1).to_be_bytes();
            bytes[..5].copy_from_slice(&[NACK_LEN as u8, hi, lo, 0x10, wire_code(outcome)]);
            crc.append(bytes, 5);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::request::encode_request;
    use crate::result::ErrorCode;

    fn decode(raw: &[u8]) -> Result<Message> {
        let mut message = Message::default();
        decode_frame(raw, &FrameConfig::default(), &mut message)?;
        Ok(message)
    }

    #[test]
    fn decodes_single_uint8_request() {
        let message = decode(&[0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0xa3]).unwrap();
        assert_eq!(message.method, 0x10);
        assert_eq!(message.params, vec![Param::U8(1)]);
    }

    #[test]
    fn decodes_unknown_method_id() {
        let message = decode(&[0x07, 0x02, 0x01, 0x10, 0x01, 0xa2, 0xcf]).unwrap();
        assert_eq!(message.method, 0x20);
    }

    #[test]
    fn decodes_zero_parameters() {
        let message = decode(&[0x05, 0x01, 0x00, 0xe2, 0x7f]).unwrap();
        assert_eq!(message.method, 0x10);
        assert!(message.params.is_empty());
    }

    #[test]
    fn second_tag_shares_the_first_tag_byte() {
        let message = decode(&[0x08, 0x01, 0x02, 0x11, 0x01, 0x02, 0x3b, 0x88]).unwrap();
        assert_eq!(message.params, vec![Param::U8(1), Param::U8(2)]);
    }

    #[test]
    fn decodes_mixed_widths_across_tag_bytes() {
        let mut buf = [0u8; 32];
        let body = [
            0x00, 0x53, // method 0x005, 3 params
            0x33, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x13, 0x88, // u32 100, u32 5000
            0x10, 0x01, // u8 1
        ];
        let len = 1 + body.len() + 2;
        buf[0] = len as u8;
        buf[1..1 + body.len()].copy_from_slice(&body);
        Crc16::DEFAULT.append(&mut buf, len - 2);

        let message = decode(&buf[..len]).unwrap();
        assert_eq!(message.method, 0x005);
        assert_eq!(
            message.params,
            vec![Param::U32(100), Param::U32(5000), Param::U8(1)]
        );
    }

    #[test]
    fn crc_failure_stops_decoding() {
        let err = decode(&[0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0xa4]).unwrap_err();
        assert!(matches!(err, FrameError::Crc { .. }));
        assert_eq!(err.error_code(), ErrorCode::Crc);
    }

    #[test]
    fn short_or_overlong_length_is_a_crc_error() {
        for raw in [&[][..], &[0x04, 0x00, 0x00, 0x00][..], &[0x09, 0x01, 0x00, 0xe2, 0x7f][..]] {
            let err = decode(raw).unwrap_err();
            assert!(matches!(err, FrameError::InvalidLength { .. }), "{raw:02x?}");
            assert_eq!(err.error_code(), ErrorCode::Crc);
        }
    }

    #[test]
    fn unknown_tag_is_a_parameters_error() {
        let mut raw = [0x07, 0x01, 0x01, 0x40, 0x01, 0x00, 0x00];
        Crc16::DEFAULT.append(&mut raw, 5);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, FrameError::UnknownTag { index: 0, tag: 4 }));
        assert_eq!(err.error_code(), ErrorCode::Parameters);
    }

    #[test]
    fn truncated_parameter_is_a_parameters_error() {
        // u32 announced but only one value byte before the checksum
        let mut raw = [0x07, 0x01, 0x01, 0x30, 0x01, 0x00, 0x00];
        Crc16::DEFAULT.append(&mut raw, 5);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { index: 0, .. }));
        assert_eq!(err.error_code(), ErrorCode::Parameters);
    }

    #[test]
    fn parameter_count_above_limit_is_rejected() {
        let config = FrameConfig {
            max_params: 1,
            ..FrameConfig::default()
        };
        let mut message = Message::default();
        let err = decode_frame(
            &[0x08, 0x01, 0x02, 0x11, 0x01, 0x02, 0x3b, 0x88],
            &config,
            &mut message,
        )
        .unwrap_err();
        assert!(matches!(err, FrameError::TooManyParams { count: 2, max: 1 }));
    }

    #[test]
    fn message_is_reused_between_frames() {
        let mut message = Message::default();
        let config = FrameConfig::default();
        decode_frame(&[0x08, 0x01, 0x02, 0x11, 0x01, 0x02, 0x3b, 0x88], &config, &mut message)
            .unwrap();
        decode_frame(&[0x05, 0x01, 0x00, 0xe2, 0x7f], &config, &mut message).unwrap();
        assert!(message.params.is_empty());
    }

    #[test]
    fn ack_matches_reference_bytes() {
        let mut buf = FrameBuffer::from_slice(&[0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0xa3]).unwrap();
        encode_response(&mut buf, &Ok(()), &Crc16::DEFAULT);
        assert_eq!(buf.as_frame(), &[0x05, 0x00, 0x00, 0xa1, 0xb5]);
    }

    #[test]
    fn nack_matches_reference_bytes() {
        let cases: [(ErrorCode, [u8; 2]); 3] = [
            (ErrorCode::Crc, [0xcc, 0x08]),
            (ErrorCode::Method, [0x6e, 0xe2]),
            (ErrorCode::Parameters, [0xbf, 0x97]),
        ];
        for (code, crc) in cases {
            let mut buf = FrameBuffer::new();
            encode_response(&mut buf, &Err(code), &Crc16::DEFAULT);
            assert_eq!(
                buf.as_frame(),
                &[0x07, 0x00, 0x11, 0x10, code.wire(), crc[0], crc[1]],
                "{code:?}"
            );
        }
    }

    #[test]
    fn every_response_validates() {
        let outcomes = [
            Ok(()),
            Err(ErrorCode::TooEarly),
            Err(ErrorCode::Timeout),
            Err(ErrorCode::Generic),
        ];
        for outcome in outcomes {
            let mut buf = FrameBuffer::new();
            encode_response(&mut buf, &outcome, &Crc16::DEFAULT);
            assert_eq!(Crc16::DEFAULT.residue(buf.as_frame()), 0);
        }
    }

    #[test]
    fn frame_buffer_rejects_oversized_input() {
        let err = FrameBuffer::from_slice(&[0u8; FRAME_CAPACITY + 1]).unwrap_err();
        assert!(matches!(err, FrameError::TooLong { len: 65, max: 64 }));
    }

    #[test]
    fn frame_len_is_clamped_to_capacity() {
        let buf = FrameBuffer::from_slice(&[0xff]).unwrap();
        assert_eq!(buf.as_frame().len(), FRAME_CAPACITY);
    }

    fn wire_param() -> impl Strategy<Value = Param> {
        prop_oneof![
            any::<u8>().prop_map(Param::U8),
            any::<u16>().prop_map(Param::U16),
            any::<u32>().prop_map(Param::U32),
        ]
    }

    proptest! {
        #[test]
        fn single_bit_flip_in_a_request_is_a_crc_error(
            method in 0u16..=0xFFF,
            params in proptest::collection::vec(wire_param(), 0..=8),
            bit in any::<prop::sample::Index>(),
        ) {
            let mut buf = encode_request(method, &params, &Crc16::DEFAULT).unwrap();
            let len = buf.as_frame().len();
            prop_assert_eq!(decode(buf.as_frame()).map(|m| m.method).ok(), Some(method));

            // The length byte stays intact so the frame keeps its extent.
            let bit = 8 + bit.index((len - 1) * 8);
            buf.as_mut_bytes()[bit / 8] ^= 0x80 >> (bit % 8);

            prop_assert_eq!(
                decode(buf.as_frame()).map_err(|e| e.error_code()),
                Err(ErrorCode::Crc)
            );
        }
    }
}
