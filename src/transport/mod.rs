//! Transport module - non-blocking payload exchange with the client.
//!
//! A session never waits on its transport. Every call either completes a
//! whole payload (`Ready`), cannot make progress right now (`NotReady`), or
//! fails. End of stream is reported as `TracewireError::EndOfStream`.
//!
//! Implementations:
//! - [`StreamTransport`] - length-prefixed frames over a tokio TCP or Unix
//!   stream, driven with `try_read`/`try_write`
//! - [`MemoryTransport`] - in-process loopback with a scriptable peer
//! - [`UnixSocketListener`] - socket file binding for Unix stream servers

mod memory;
mod stream;
#[cfg(unix)]
mod unix;

pub use memory::{MemoryPeer, MemoryTransport};
pub use stream::{NonBlockingStream, StreamTransport};
#[cfg(unix)]
pub use unix::{generate_socket_path, UnixSocketListener};

use crate::error::Result;
use crate::protocol::PayloadContainer;

/// Outcome of a non-blocking transport call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// The payload was received or accepted for sending.
    Ready,
    /// Nothing happened; try again later.
    NotReady,
}

impl TransportStatus {
    #[inline]
    pub fn is_ready(self) -> bool {
        self == TransportStatus::Ready
    }
}

/// Non-blocking, payload-oriented connection to one client.
pub trait Transport: Send {
    /// Receive the next payload into `container`.
    ///
    /// On `NotReady` the container's contents are unspecified.
    fn try_receive(&mut self, container: &mut PayloadContainer) -> Result<TransportStatus>;

    /// Send one payload.
    ///
    /// On `NotReady` nothing was sent and the caller keeps ownership of the
    /// bytes to retry with. On `Ready` the whole payload was taken.
    fn try_send(&mut self, payload: &[u8]) -> Result<TransportStatus>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn try_receive(&mut self, container: &mut PayloadContainer) -> Result<TransportStatus> {
        (**self).try_receive(container)
    }

    fn try_send(&mut self, payload: &[u8]) -> Result<TransportStatus> {
        (**self).try_send(payload)
    }
}
