//! Wire format constants, command codes and result codes.
//!
//! Every payload travels inside a stream frame:
//! ```text
//! ┌──────────────┬───────────────────────────────────────┐
//! │ Length       │ Payload                               │
//! │ 4 bytes      │ Length bytes                          │
//! │ uint32 BE    │ [command u8][reserved 3][fields ...]  │
//! └──────────────┴───────────────────────────────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use std::fmt;

use crate::error::{Result, TracewireError};

/// Stream frame header size in bytes (payload length prefix).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Maximum size of a single payload, event header included.
pub const MAX_PAYLOAD_SIZE: usize = 1392;

/// Size of the event header that starts every payload.
pub const EVENT_HEADER_SIZE: usize = 4;

/// Size of the `data_size` field of an event data update.
pub const EVENT_DATA_SIZE_FIELD: usize = 4;

/// Largest slice of chunk bytes carried by one event data update.
pub const MAX_EVENT_DATA_SIZE: usize = MAX_PAYLOAD_SIZE - EVENT_HEADER_SIZE - EVENT_DATA_SIZE_FIELD;

/// Size of the header producers write in front of each event.
pub const EVENT_RECORD_HEADER_SIZE: usize = 12;

/// Command codes carried in the first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventCommand {
    QueryProvidersRequest = 1,
    QueryProvidersResponse = 2,
    AllocateProviderUpdatesRequest = 3,
    AllocateProviderUpdatesResponse = 4,
    ApplyProviderUpdatesRequest = 5,
    ApplyProviderUpdatesResponse = 6,
    /// Server to client only, never paired with a request.
    EventDataUpdate = 7,
}

impl EventCommand {
    /// Wire value of this command.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether a client may send this command to the server.
    #[inline]
    pub fn is_request(self) -> bool {
        matches!(
            self,
            EventCommand::QueryProvidersRequest
                | EventCommand::AllocateProviderUpdatesRequest
                | EventCommand::ApplyProviderUpdatesRequest
        )
    }
}

impl TryFrom<u8> for EventCommand {
    type Error = TracewireError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(EventCommand::QueryProvidersRequest),
            2 => Ok(EventCommand::QueryProvidersResponse),
            3 => Ok(EventCommand::AllocateProviderUpdatesRequest),
            4 => Ok(EventCommand::AllocateProviderUpdatesResponse),
            5 => Ok(EventCommand::ApplyProviderUpdatesRequest),
            6 => Ok(EventCommand::ApplyProviderUpdatesResponse),
            7 => Ok(EventCommand::EventDataUpdate),
            other => Err(TracewireError::UnknownCommand(other)),
        }
    }
}

/// Result codes reported to the peer inside responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResultCode {
    Success = 0,
    Error = 1,
    Unavailable = 4,
    Rejected = 5,
    InsufficientMemory = 8,
    InvalidParameter = 9,
}

impl ResultCode {
    /// Wire value of this result.
    #[inline]
    pub fn code(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

impl TryFrom<u32> for ResultCode {
    type Error = TracewireError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(ResultCode::Success),
            1 => Ok(ResultCode::Error),
            4 => Ok(ResultCode::Unavailable),
            5 => Ok(ResultCode::Rejected),
            8 => Ok(ResultCode::InsufficientMemory),
            9 => Ok(ResultCode::InvalidParameter),
            other => Err(TracewireError::Protocol(format!(
                "Unknown result code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Encode a stream frame header for a payload of `payload_len` bytes.
#[inline]
pub fn encode_frame_header(payload_len: usize) -> [u8; FRAME_HEADER_SIZE] {
    debug_assert!(payload_len <= MAX_PAYLOAD_SIZE);
    (payload_len as u32).to_be_bytes()
}

/// Decode a stream frame header.
///
/// Returns `None` if buffer is too short.
#[inline]
pub fn decode_frame_header(buf: &[u8]) -> Option<u32> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    Some(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

/// Validate a decoded frame length.
///
/// Checks:
/// - Payload holds at least the event header
/// - Payload doesn't exceed `MAX_PAYLOAD_SIZE`
pub fn validate_frame_length(payload_len: u32) -> Result<()> {
    let len = payload_len as usize;
    if len < EVENT_HEADER_SIZE {
        return Err(TracewireError::Protocol(format!(
            "Payload size {} is smaller than the event header",
            len
        )));
    }
    if len > MAX_PAYLOAD_SIZE {
        return Err(TracewireError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

/// Header in front of every event a producer writes into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecordHeader {
    pub provider_id: u32,
    pub event_id: u32,
    pub payload_size: u32,
}

impl EventRecordHeader {
    pub fn new(provider_id: u32, event_id: u32, payload_size: u32) -> Self {
        Self {
            provider_id,
            event_id,
            payload_size,
        }
    }

    pub fn encode(&self) -> [u8; EVENT_RECORD_HEADER_SIZE] {
        let mut buf = [0u8; EVENT_RECORD_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.provider_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.event_id.to_be_bytes());
        buf[8..12].copy_from_slice(&self.payload_size.to_be_bytes());
        buf
    }

    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < EVENT_RECORD_HEADER_SIZE {
            return None;
        }
        Some(Self {
            provider_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            event_id: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            payload_size: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}
