//! Protocol module - wire format, messages, payload containers and framing.
//!
//! This module implements the binary protocol spoken by a session:
//! - Command and result codes, frame length prefix
//! - Typed messages with encode/decode
//! - Reusable payload container the session builds responses in
//! - Frame buffer for accumulating partial stream reads

mod frame_buffer;
mod message;
mod payload;
mod wire_format;

pub use frame_buffer::{build_frame, FrameBuffer};
pub use message::{read_command, EventMessage};
pub use payload::PayloadContainer;
pub use wire_format::{
    decode_frame_header, encode_frame_header, validate_frame_length, EventCommand,
    EventRecordHeader, ResultCode, EVENT_DATA_SIZE_FIELD, EVENT_HEADER_SIZE,
    EVENT_RECORD_HEADER_SIZE, FRAME_HEADER_SIZE, MAX_EVENT_DATA_SIZE, MAX_PAYLOAD_SIZE,
};
