//! Length-prefixed framing over a non-blocking byte stream.
//!
//! Each payload travels as `[u32 BE length][payload]`. Reads go through a
//! [`FrameBuffer`] so a frame split across socket reads is reassembled;
//! writes land in an outbound buffer bounded by a [`SendWindow`] and are
//! flushed opportunistically on every call.

use std::collections::VecDeque;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Transport, TransportStatus};
use crate::backpressure::SendWindow;
use crate::config::StreamConfig;
use crate::error::{Result, TracewireError};
use crate::protocol::{
    encode_frame_header, FrameBuffer, PayloadContainer, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};

/// A byte stream with non-blocking `try_read`/`try_write`.
///
/// Both calls return `ErrorKind::WouldBlock` when the socket is not ready.
pub trait NonBlockingStream: Send {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize>;
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

impl NonBlockingStream for tokio::net::TcpStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::TcpStream::try_read(self, buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        tokio::net::TcpStream::try_write(self, buf)
    }
}

#[cfg(unix)]
impl NonBlockingStream for tokio::net::UnixStream {
    fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::net::UnixStream::try_read(self, buf)
    }

    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        tokio::net::UnixStream::try_write(self, buf)
    }
}

/// Framed transport over a [`NonBlockingStream`].
pub struct StreamTransport<S> {
    stream: S,
    frames: FrameBuffer,
    /// Complete frames read but not yet handed to the session.
    ready: VecDeque<Bytes>,
    outbound: BytesMut,
    window: SendWindow,
    read_buf: Vec<u8>,
}

impl<S: NonBlockingStream> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, StreamConfig::default())
    }

    pub fn with_config(stream: S, config: StreamConfig) -> Self {
        Self {
            stream,
            frames: FrameBuffer::new(),
            ready: VecDeque::new(),
            outbound: BytesMut::with_capacity(config.send_window),
            window: SendWindow::new(config.send_window),
            read_buf: vec![0u8; config.read_buffer_size.max(1)],
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Bytes buffered for writing.
    #[inline]
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Whether every sent frame has reached the socket.
    #[inline]
    pub fn is_flushed(&self) -> bool {
        self.outbound.is_empty()
    }

    /// Write as much buffered output as the socket takes.
    pub fn flush(&mut self) -> Result<()> {
        while !self.outbound.is_empty() {
            match self.stream.try_write(&self.outbound) {
                Ok(0) => {
                    return Err(TracewireError::Transport(
                        "stream accepted zero bytes".into(),
                    ))
                }
                Ok(n) => {
                    self.outbound.advance(n);
                    self.window.release(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read until at least one complete frame is available or the socket
    /// runs dry.
    fn fill_ready(&mut self) -> Result<()> {
        while self.ready.is_empty() {
            match self.stream.try_read(&mut self.read_buf) {
                Ok(0) => return Err(TracewireError::EndOfStream),
                Ok(n) => {
                    // A bad length prefix leaves no way to find the next frame.
                    let frames = self
                        .frames
                        .push(&self.read_buf[..n])
                        .map_err(|e| TracewireError::Transport(format!("framing lost: {}", e)))?;
                    self.ready.extend(frames);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl<S: NonBlockingStream> Transport for StreamTransport<S> {
    fn try_receive(&mut self, container: &mut PayloadContainer) -> Result<TransportStatus> {
        self.flush()?;
        self.fill_ready()?;

        match self.ready.pop_front() {
            Some(frame) => {
                container.fill_from(&frame)?;
                Ok(TransportStatus::Ready)
            }
            None => Ok(TransportStatus::NotReady),
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> Result<TransportStatus> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TracewireError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        self.flush()?;
        if !self.window.try_reserve(FRAME_HEADER_SIZE + payload.len()) {
            return Ok(TransportStatus::NotReady);
        }

        self.outbound.put_slice(&encode_frame_header(payload.len()));
        self.outbound.put_slice(payload);
        self.flush()?;
        Ok(TransportStatus::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, EventMessage};
    use parking_lot::Mutex;

    /// Scripted stream: reads pop queued chunks, writes accept a budget.
    #[derive(Default)]
    struct ScriptedStream {
        reads: Mutex<VecDeque<io::Result<Vec<u8>>>>,
        written: Mutex<Vec<u8>>,
        write_budget: Mutex<Option<usize>>,
    }

    impl ScriptedStream {
        fn queue_read(&self, bytes: &[u8]) {
            self.reads.lock().push_back(Ok(bytes.to_vec()));
        }
    }

    impl NonBlockingStream for ScriptedStream {
        fn try_read(&self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.lock().pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }

        fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
            let mut budget = self.write_budget.lock();
            let n = match *budget {
                Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
                Some(left) => {
                    let n = left.min(buf.len());
                    *budget = Some(left - n);
                    n
                }
                None => buf.len(),
            };
            self.written.lock().extend_from_slice(&buf[..n]);
            Ok(n)
        }
    }

    #[test]
    fn test_receive_reassembles_split_frame() {
        let frame = build_frame(&EventMessage::QueryProvidersRequest.encode());
        let mut transport = StreamTransport::new(ScriptedStream::default());
        let mut container = PayloadContainer::new();

        transport.get_ref().queue_read(&frame[..3]);
        assert_eq!(
            transport.try_receive(&mut container).unwrap(),
            TransportStatus::NotReady
        );

        transport.get_ref().queue_read(&frame[3..]);
        assert_eq!(
            transport.try_receive(&mut container).unwrap(),
            TransportStatus::Ready
        );
        assert_eq!(
            container.decode().unwrap(),
            EventMessage::QueryProvidersRequest
        );
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut bytes = build_frame(&EventMessage::QueryProvidersRequest.encode());
        bytes.extend(build_frame(&EventMessage::ApplyProviderUpdatesRequest.encode()));
        let mut transport = StreamTransport::new(ScriptedStream::default());
        transport.get_ref().queue_read(&bytes);
        let mut container = PayloadContainer::new();

        transport.try_receive(&mut container).unwrap();
        assert_eq!(container.decode().unwrap(), EventMessage::QueryProvidersRequest);
        transport.try_receive(&mut container).unwrap();
        assert_eq!(
            container.decode().unwrap(),
            EventMessage::ApplyProviderUpdatesRequest
        );
    }

    #[test]
    fn test_zero_read_is_end_of_stream() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        transport.get_ref().queue_read(&[]);

        let result = transport.try_receive(&mut PayloadContainer::new());
        assert!(matches!(result, Err(TracewireError::EndOfStream)));
    }

    #[test]
    fn test_bad_length_prefix_is_fatal() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        transport.get_ref().queue_read(&u32::MAX.to_be_bytes());

        let err = transport.try_receive(&mut PayloadContainer::new()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_send_writes_framed_payload() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        let payload = EventMessage::ApplyProviderUpdatesRequest.encode();

        assert_eq!(transport.try_send(&payload).unwrap(), TransportStatus::Ready);
        assert_eq!(*transport.get_ref().written.lock(), build_frame(&payload));
        assert!(transport.is_flushed());
    }

    #[test]
    fn test_full_window_reports_not_ready_until_flushed() {
        let stream = ScriptedStream::default();
        *stream.write_budget.lock() = Some(0);
        let config = StreamConfig::default().with_send_window(MAX_PAYLOAD_SIZE);
        let mut transport = StreamTransport::with_config(stream, config);
        let payload = vec![7u8; 1000];

        assert_eq!(transport.try_send(&payload).unwrap(), TransportStatus::Ready);
        assert_eq!(transport.outbound_len(), FRAME_HEADER_SIZE + 1000);
        assert_eq!(
            transport.try_send(&payload).unwrap(),
            TransportStatus::NotReady
        );

        *transport.get_ref().write_budget.lock() = None;
        assert_eq!(transport.try_send(&payload).unwrap(), TransportStatus::Ready);
        assert_eq!(transport.get_ref().written.lock().len(), 2 * (FRAME_HEADER_SIZE + 1000));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut transport = StreamTransport::new(ScriptedStream::default());
        let result = transport.try_send(&vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        assert!(matches!(result, Err(TracewireError::Protocol(_))));
    }

    #[test]
    fn test_write_error_propagates() {
        struct BrokenStream;
        impl NonBlockingStream for BrokenStream {
            fn try_read(&self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::WouldBlock.into())
            }
            fn try_write(&self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }

        let mut transport = StreamTransport::new(BrokenStream);
        let result = transport.try_send(&EventMessage::QueryProvidersRequest.encode());
        assert!(matches!(result, Err(TracewireError::Io(_))));
    }
}
