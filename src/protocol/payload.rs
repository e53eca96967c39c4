//! Reusable payload container.
//!
//! A session keeps two containers for its whole lifetime: one for the
//! request/response exchange and one for event data. Each holds exactly one
//! encoded message; creating a new message overwrites the previous one in
//! place without reallocating.

use bytes::BytesMut;

use super::message::{put_event_data, put_event_header, read_command, EventMessage};
use super::wire_format::{EventCommand, MAX_EVENT_DATA_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::{Result, TracewireError};

/// Fixed-capacity envelope carrying one encoded message.
#[derive(Debug)]
pub struct PayloadContainer {
    payload: BytesMut,
}

impl PayloadContainer {
    /// Create an empty container with `MAX_PAYLOAD_SIZE` capacity.
    pub fn new() -> Self {
        Self {
            payload: BytesMut::with_capacity(MAX_PAYLOAD_SIZE),
        }
    }

    /// Size of the message currently held.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encoded bytes of the message currently held.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    pub fn clear(&mut self) {
        self.payload.clear();
    }

    /// Replace the contents with bytes received from a transport.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if `bytes` exceeds `MAX_PAYLOAD_SIZE`; the
    /// container is left empty in that case.
    pub fn fill_from(&mut self, bytes: &[u8]) -> Result<()> {
        self.payload.clear();
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(TracewireError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                bytes.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        self.payload.extend_from_slice(bytes);
        Ok(())
    }

    /// Overwrite the contents with `message`.
    pub fn create(&mut self, message: &EventMessage) {
        debug_assert!(message.encoded_len() <= MAX_PAYLOAD_SIZE);
        self.payload.clear();
        message.encode_into(&mut self.payload);
    }

    /// Overwrite the contents with an event data update carrying `data`.
    ///
    /// Copies straight from the chunk slice, no intermediate message.
    pub fn create_event_data(&mut self, data: &[u8]) {
        debug_assert!(data.len() <= MAX_EVENT_DATA_SIZE);
        self.payload.clear();
        put_event_header(&mut self.payload, EventCommand::EventDataUpdate);
        put_event_data(&mut self.payload, data);
    }

    /// Command code of the message currently held.
    pub fn command(&self) -> Result<EventCommand> {
        read_command(&self.payload)
    }

    /// Decode the message currently held.
    pub fn decode(&self) -> Result<EventMessage> {
        EventMessage::decode(&self.payload)
    }
}

impl Default for PayloadContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResultCode;
    use crate::transfer::BlockId;

    #[test]
    fn test_new_container_is_empty() {
        let container = PayloadContainer::new();
        assert!(container.is_empty());
        assert_eq!(container.payload_size(), 0);
        assert!(container.command().is_err());
    }

    #[test]
    fn test_create_overwrites_in_place() {
        let mut container = PayloadContainer::new();
        container.fill_from(&EventMessage::QueryProvidersRequest.encode()).unwrap();
        assert_eq!(container.command().unwrap(), EventCommand::QueryProvidersRequest);

        let response = EventMessage::QueryProvidersResponse {
            result: ResultCode::Success,
            block_id: BlockId::new(9),
        };
        container.create(&response);

        assert_eq!(container.payload_size(), 12);
        assert_eq!(container.decode().unwrap(), response);
    }

    #[test]
    fn test_create_does_not_grow_capacity() {
        let mut container = PayloadContainer::new();
        let data = vec![0x5A; MAX_EVENT_DATA_SIZE];

        for _ in 0..4 {
            container.create_event_data(&data);
            assert_eq!(container.payload_size(), MAX_PAYLOAD_SIZE);
        }
        assert!(container.payload.capacity() >= MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_create_event_data_matches_message_encoding() {
        let mut container = PayloadContainer::new();
        container.create_event_data(b"chunk bytes");

        let expected = EventMessage::EventDataUpdate {
            data: bytes::Bytes::from_static(b"chunk bytes"),
        };
        assert_eq!(container.as_bytes(), &expected.encode()[..]);
    }

    #[test]
    fn test_fill_from_rejects_oversized() {
        let mut container = PayloadContainer::new();
        let oversized = vec![1u8; MAX_PAYLOAD_SIZE + 1];

        assert!(container.fill_from(&oversized).is_err());
        assert!(container.is_empty());
    }
}
