//! Frame codec for the Protocol for Remote Execution of Automated Tests.
//!
//! Every frame on the wire is:
//! - a 1-byte total length (counting itself and the checksum)
//! - a 12-bit method id and a 4-bit parameter count packed in two bytes
//! - the parameters, each announced by a 4-bit type tag (two tags per byte)
//! - a big-endian CRC-16 chosen so that the checksum of the whole frame is zero
//!
//! Responses are fixed: a 5-byte acknowledgement, or a 7-byte failure frame
//! carrying one `UINT8` error code.

pub mod codec;
pub mod crc;
pub mod error;
pub mod method;
pub mod param;
pub mod reader;
pub mod request;
pub mod result;
pub mod writer;

pub use codec::{
    decode_frame, encode_response, FrameBuffer, FrameConfig, Message, ACK_LEN, DEFAULT_MAX_PARAMS,
    FRAME_CAPACITY, MIN_FRAME_LEN, NACK_LEN,
};
pub use crc::Crc16;
pub use error::{FrameError, Result};
pub use method::{
    is_reserved, method_name, MAX_METHOD_ID, RESPONSE_ACK, RESPONSE_NACK, START_ASSERTION,
    USER_METHOD_START,
};
pub use param::{match_signature, Param, ParamKind, SINGLE_UINT8, START_ASSERTION_SIGNATURE};
pub use reader::FrameReader;
pub use request::{decode_response, encode_request};
pub use result::{wire_code, ErrorCode, Outcome};
pub use writer::FrameWriter;
