//! Host side of the protocol: building requests and reading responses.

use crate::codec::{FrameBuffer, ACK_LEN, FRAME_CAPACITY, MIN_FRAME_LEN, NACK_LEN};
use crate::crc::Crc16;
use crate::error::{FrameError, Result};
use crate::method::{MAX_METHOD_ID, RESPONSE_ACK, RESPONSE_NACK};
use crate::param::{Param, ParamKind};
use crate::result::{ErrorCode, Outcome};

/// Largest parameter count the header nibble can carry.
const MAX_WIRE_PARAMS: usize = 0x0F;

/// Build a request frame for `method` with `params`.
///
/// Only integer parameters have a wire encoding.
pub fn encode_request(method: u16, params: &[Param], crc: &Crc16) -> Result<FrameBuffer> {
    if method > MAX_METHOD_ID {
        return Err(FrameError::InvalidMethod(method));
    }
    if params.len() > MAX_WIRE_PARAMS {
        return Err(FrameError::TooManyParams {
            count: params.len(),
            max: MAX_WIRE_PARAMS,
        });
    }

    let mut body = Vec::with_capacity(FRAME_CAPACITY);
    body.push((method >> 4) as u8);
    body.push((((method & 0x0F) as u8) << 4) | params.len() as u8);

    for (index, pair) in params.chunks(2).enumerate() {
        let mut tags = 0u8;
        for (slot, param) in pair.iter().enumerate() {
            let tag = param
                .kind()
                .tag()
                .ok_or(FrameError::UnsupportedKind(param.kind()))?;
            tags |= tag << (4 * (1 - slot));
        }
        body.push(tags);
        for param in pair {
            push_value(&mut body, param)?;
        }
        tracing::trace!(pair = index, tags, "packed parameter pair");
    }

    let len = 1 + body.len() + 2;
    if len > FRAME_CAPACITY {
        return Err(FrameError::TooLong {
            len,
            max: FRAME_CAPACITY,
        });
    }

    let mut buf = FrameBuffer::new();
    let bytes = buf.as_mut_bytes();
    bytes[0] = len as u8;
    bytes[1..1 + body.len()].copy_from_slice(&body);
    crc.append(bytes, len - 2);
    Ok(buf)
}

fn push_value(body: &mut Vec<u8>, param: &Param) -> Result<()> {
    match param {
        Param::U8(value) => body.push(*value),
        Param::U16(value) => body.extend_from_slice(&value.to_be_bytes()),
        Param::U32(value) => body.extend_from_slice(&value.to_be_bytes()),
        Param::Blob(_) | Param::Binary(_) => return Err(FrameError::UnsupportedKind(param.kind())),
    }
    Ok(())
}

/// Interpret a response frame received from a target.
pub fn decode_response(raw: &[u8], crc: &Crc16) -> Result<Outcome> {
    let len = raw.first().copied().map(usize::from).unwrap_or(0);
    if len < MIN_FRAME_LEN || len > raw.len() {
        return Err(FrameError::InvalidLength {
            len,
            available: raw.len(),
        });
    }
    let frame = &raw[..len];

    let residue = crc.residue(frame);
    if residue != 0 {
        return Err(FrameError::Crc { residue });
    }

    let method = (u16::from(frame[1]) << 4) | u16::from(frame[2] >> 4);
    let count = frame[2] & 0x0F;
    match (method, count, len) {
        (RESPONSE_ACK, 0, ACK_LEN) => Ok(Ok(())),
        (RESPONSE_NACK, 1, NACK_LEN) => {
            if ParamKind::from_tag(frame[3] >> 4) != Some(ParamKind::U8) {
                return Err(FrameError::InvalidResponse(format!(
                    "failure code has type tag 0x{:x}",
                    frame[3] >> 4
                )));
            }
            ErrorCode::from_wire(frame[4])
                .map(Err)
                .ok_or_else(|| FrameError::InvalidResponse(format!("unknown error code 0x{:02x}", frame[4])))
        }
        _ => Err(FrameError::InvalidResponse(format!(
            "method 0x{method:03x} with {count} parameters in {len} bytes"
        ))),
    }
}
