//! Typed protocol messages.
//!
//! Each message starts with the 4-byte event header (command code plus three
//! reserved bytes) followed by its fields:
//!
//! | Command | Fields |
//! |---|---|
//! | `*Request` | none |
//! | `QueryProvidersResponse` | `result u32`, `block_id u32` |
//! | `AllocateProviderUpdatesResponse` | `result u32`, `block_id u32` |
//! | `ApplyProviderUpdatesResponse` | `result u32` |
//! | `EventDataUpdate` | `data_size u32`, data |
//!
//! # Example
//!
//! ```
//! use tracewire::protocol::{EventMessage, ResultCode};
//! use tracewire::transfer::BlockId;
//!
//! let msg = EventMessage::QueryProvidersResponse {
//!     result: ResultCode::Success,
//!     block_id: BlockId::new(4),
//! };
//! let bytes = msg.encode();
//! assert_eq!(EventMessage::decode(&bytes).unwrap(), msg);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{
    EventCommand, ResultCode, EVENT_DATA_SIZE_FIELD, EVENT_HEADER_SIZE, MAX_EVENT_DATA_SIZE,
};
use crate::error::{Result, TracewireError};
use crate::transfer::BlockId;

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMessage {
    QueryProvidersRequest,
    QueryProvidersResponse { result: ResultCode, block_id: BlockId },
    AllocateProviderUpdatesRequest,
    AllocateProviderUpdatesResponse { result: ResultCode, block_id: BlockId },
    ApplyProviderUpdatesRequest,
    ApplyProviderUpdatesResponse { result: ResultCode },
    EventDataUpdate { data: Bytes },
}

impl EventMessage {
    /// Command code of this message.
    pub fn command(&self) -> EventCommand {
        match self {
            EventMessage::QueryProvidersRequest => EventCommand::QueryProvidersRequest,
            EventMessage::QueryProvidersResponse { .. } => EventCommand::QueryProvidersResponse,
            EventMessage::AllocateProviderUpdatesRequest => {
                EventCommand::AllocateProviderUpdatesRequest
            }
            EventMessage::AllocateProviderUpdatesResponse { .. } => {
                EventCommand::AllocateProviderUpdatesResponse
            }
            EventMessage::ApplyProviderUpdatesRequest => EventCommand::ApplyProviderUpdatesRequest,
            EventMessage::ApplyProviderUpdatesResponse { .. } => {
                EventCommand::ApplyProviderUpdatesResponse
            }
            EventMessage::EventDataUpdate { .. } => EventCommand::EventDataUpdate,
        }
    }

    /// Encoded size of this message in bytes.
    pub fn encoded_len(&self) -> usize {
        EVENT_HEADER_SIZE
            + match self {
                EventMessage::QueryProvidersRequest
                | EventMessage::AllocateProviderUpdatesRequest
                | EventMessage::ApplyProviderUpdatesRequest => 0,
                EventMessage::QueryProvidersResponse { .. }
                | EventMessage::AllocateProviderUpdatesResponse { .. } => 8,
                EventMessage::ApplyProviderUpdatesResponse { .. } => 4,
                EventMessage::EventDataUpdate { data } => EVENT_DATA_SIZE_FIELD + data.len(),
            }
    }

    /// Encode into an existing buffer (appends).
    pub fn encode_into(&self, buf: &mut BytesMut) {
        put_event_header(buf, self.command());
        match self {
            EventMessage::QueryProvidersRequest
            | EventMessage::AllocateProviderUpdatesRequest
            | EventMessage::ApplyProviderUpdatesRequest => {}
            EventMessage::QueryProvidersResponse { result, block_id }
            | EventMessage::AllocateProviderUpdatesResponse { result, block_id } => {
                buf.put_u32(result.code());
                buf.put_u32(block_id.raw());
            }
            EventMessage::ApplyProviderUpdatesResponse { result } => {
                buf.put_u32(result.code());
            }
            EventMessage::EventDataUpdate { data } => {
                put_event_data(buf, data);
            }
        }
    }

    /// Encode to a fresh byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.to_vec()
    }

    /// Decode a complete payload.
    ///
    /// # Errors
    ///
    /// - `UnknownCommand` if the first byte is not a command code
    /// - `Protocol` if the payload is truncated or has trailing bytes
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let command = read_command(payload)?;
        let body = &payload[EVENT_HEADER_SIZE..];

        let message = match command {
            EventCommand::QueryProvidersRequest => {
                expect_len(command, body, 0)?;
                EventMessage::QueryProvidersRequest
            }
            EventCommand::AllocateProviderUpdatesRequest => {
                expect_len(command, body, 0)?;
                EventMessage::AllocateProviderUpdatesRequest
            }
            EventCommand::ApplyProviderUpdatesRequest => {
                expect_len(command, body, 0)?;
                EventMessage::ApplyProviderUpdatesRequest
            }
            EventCommand::QueryProvidersResponse => {
                expect_len(command, body, 8)?;
                EventMessage::QueryProvidersResponse {
                    result: ResultCode::try_from(read_u32(body, 0))?,
                    block_id: BlockId::new(read_u32(body, 4)),
                }
            }
            EventCommand::AllocateProviderUpdatesResponse => {
                expect_len(command, body, 8)?;
                EventMessage::AllocateProviderUpdatesResponse {
                    result: ResultCode::try_from(read_u32(body, 0))?,
                    block_id: BlockId::new(read_u32(body, 4)),
                }
            }
            EventCommand::ApplyProviderUpdatesResponse => {
                expect_len(command, body, 4)?;
                EventMessage::ApplyProviderUpdatesResponse {
                    result: ResultCode::try_from(read_u32(body, 0))?,
                }
            }
            EventCommand::EventDataUpdate => {
                if body.len() < EVENT_DATA_SIZE_FIELD {
                    return Err(truncated(command, body.len()));
                }
                let data_size = read_u32(body, 0) as usize;
                expect_len(command, body, EVENT_DATA_SIZE_FIELD + data_size)?;
                EventMessage::EventDataUpdate {
                    data: Bytes::copy_from_slice(&body[EVENT_DATA_SIZE_FIELD..]),
                }
            }
        };

        Ok(message)
    }
}

/// Read the command code of a payload without decoding its fields.
pub fn read_command(payload: &[u8]) -> Result<EventCommand> {
    if payload.len() < EVENT_HEADER_SIZE {
        return Err(TracewireError::Protocol(format!(
            "Payload size {} is smaller than the event header",
            payload.len()
        )));
    }
    EventCommand::try_from(payload[0])
}

pub(crate) fn put_event_header(buf: &mut BytesMut, command: EventCommand) {
    buf.put_u8(command.code());
    buf.put_bytes(0, EVENT_HEADER_SIZE - 1);
}

pub(crate) fn put_event_data(buf: &mut BytesMut, data: &[u8]) {
    debug_assert!(data.len() <= MAX_EVENT_DATA_SIZE);
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

#[inline]
fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn expect_len(command: EventCommand, body: &[u8], expected: usize) -> Result<()> {
    if body.len() < expected {
        return Err(truncated(command, body.len()));
    }
    if body.len() > expected {
        return Err(TracewireError::Protocol(format!(
            "{:?} carries {} trailing bytes",
            command,
            body.len() - expected
        )));
    }
    Ok(())
}

fn truncated(command: EventCommand, len: usize) -> TracewireError {
    TracewireError::Protocol(format!("{:?} truncated at {} body bytes", command, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let bytes = EventMessage::ApplyProviderUpdatesRequest.encode();
        assert_eq!(bytes, vec![5, 0, 0, 0]);
    }

    #[test]
    fn test_response_layout_big_endian() {
        let bytes = EventMessage::AllocateProviderUpdatesResponse {
            result: ResultCode::InvalidParameter,
            block_id: BlockId::new(0x0102),
        }
        .encode();

        assert_eq!(bytes, vec![4, 0, 0, 0, 0, 0, 0, 9, 0, 0, 0x01, 0x02]);
    }

    #[test]
    fn test_event_data_layout() {
        let msg = EventMessage::EventDataUpdate {
            data: Bytes::from_static(b"abc"),
        };
        let bytes = msg.encode();

        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(&bytes[..8], &[7, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(&bytes[8..], b"abc");
        assert_eq!(EventMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_unknown_command() {
        let result = EventMessage::decode(&[99, 0, 0, 0]);
        assert!(matches!(result, Err(TracewireError::UnknownCommand(99))));
    }

    #[test]
    fn test_decode_truncated_response() {
        let result = EventMessage::decode(&[2, 0, 0, 0, 0, 0]);
        assert!(result.unwrap_err().to_string().contains("truncated"));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let result = EventMessage::decode(&[1, 0, 0, 0, 0xFF]);
        assert!(result.unwrap_err().to_string().contains("trailing"));
    }

    #[test]
    fn test_decode_event_data_size_mismatch() {
        // Claims 5 data bytes, carries 2
        let result = EventMessage::decode(&[7, 0, 0, 0, 0, 0, 0, 5, 1, 2]);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_command_short_payload() {
        assert!(read_command(&[1, 0]).is_err());
        assert_eq!(
            read_command(&[3, 0, 0, 0]).unwrap(),
            EventCommand::AllocateProviderUpdatesRequest
        );
    }
}
