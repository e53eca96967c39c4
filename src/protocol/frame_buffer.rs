//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 4 bytes of length prefix
//! - `WaitingForPayload`: Length parsed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use tracewire::protocol::{encode_frame_header, EventMessage, FrameBuffer};
//!
//! let payload = EventMessage::QueryProvidersRequest.encode();
//! let mut bytes = encode_frame_header(payload.len()).to_vec();
//! bytes.extend_from_slice(&payload);
//!
//! let mut buffer = FrameBuffer::new();
//! let frames = buffer.push(&bytes).unwrap();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(&frames[0][..], &payload[..]);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{decode_frame_header, validate_frame_length, FRAME_HEADER_SIZE};
use crate::error::Result;

/// Default read capacity (16 full frames).
const DEFAULT_CAPACITY: usize = 16 * 1024;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete length prefix.
    WaitingForHeader,
    /// Length parsed, waiting for payload bytes.
    WaitingForPayload { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete payloads.
///
/// All data is stored in a single `BytesMut` buffer to minimize allocations.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForHeader,
        }
    }

    /// Push data into the buffer and extract all complete payloads.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if a frame declares a length outside
    /// `EVENT_HEADER_SIZE..=MAX_PAYLOAD_SIZE`. The stream cannot be resynced
    /// after that; callers should drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    let Some(length) = decode_frame_header(&self.buffer) else {
                        return Ok(None);
                    };
                    validate_frame_length(length)?;

                    let _ = self.buffer.split_to(FRAME_HEADER_SIZE);
                    self.state = State::WaitingForPayload {
                        remaining: length as usize,
                    };
                }

                State::WaitingForPayload { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a complete stream frame (length prefix + payload).
pub fn build_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&super::wire_format::encode_frame_header(payload.len()));
    buf.extend_from_slice(payload);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EventMessage, MAX_PAYLOAD_SIZE};

    fn request_frame() -> Vec<u8> {
        build_frame(&EventMessage::QueryProvidersRequest.encode())
    }

    fn event_frame(data: &[u8]) -> Vec<u8> {
        build_frame(
            &EventMessage::EventDataUpdate {
                data: Bytes::copy_from_slice(data),
            }
            .encode(),
        )
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&request_frame()).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[1, 0, 0, 0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = request_frame();
        combined.extend_from_slice(&event_frame(b"first"));
        combined.extend_from_slice(&event_frame(b"second"));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(
            EventMessage::decode(&frames[2]).unwrap(),
            EventMessage::EventDataUpdate {
                data: Bytes::from_static(b"second")
            }
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = event_frame(b"test");

        let frames = buffer.push(&bytes[..2]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");

        let frames = buffer.push(&bytes[2..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let bytes = event_frame(b"this is a longer payload that will be fragmented");

        let partial_len = FRAME_HEADER_SIZE + 10;
        let frames = buffer.push(&bytes[..partial_len]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&bytes[partial_len..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &bytes[FRAME_HEADER_SIZE..]);
    }

    #[test]
    fn test_length_below_event_header_rejected() {
        let mut buffer = FrameBuffer::new();
        let result = buffer.push(&[0, 0, 0, 2, 1, 0]);

        assert!(result.is_err());
    }

    #[test]
    fn test_length_above_max_rejected() {
        let mut buffer = FrameBuffer::new();
        let header = super::super::wire_format::encode_frame_header(MAX_PAYLOAD_SIZE);
        let mut bytes = header.to_vec();
        bytes[3] += 1;

        let result = buffer.push(&bytes);
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let bytes = event_frame(b"test");

        buffer.push(&bytes[..FRAME_HEADER_SIZE + 1]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = event_frame(b"hi");

        let mut all_frames = Vec::new();
        for byte in &bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(&all_frames[0][..], &bytes[FRAME_HEADER_SIZE..]);
    }
}
