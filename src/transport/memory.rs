//! In-process loopback transport.
//!
//! [`MemoryTransport::pair`] returns the server end and a [`MemoryPeer`]
//! standing in for the client. The peer can queue requests, collect what
//! the server sent, limit how many sends succeed, force send failures and
//! close the connection.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::{Transport, TransportStatus};
use crate::error::{Result, TracewireError};
use crate::protocol::{EventMessage, PayloadContainer};

#[derive(Debug, Default)]
struct Shared {
    /// Peer to server.
    inbound: VecDeque<Bytes>,
    /// Server to peer.
    outbound: VecDeque<Bytes>,
    closed: bool,
    /// Sends that may still succeed; unlimited when `None`.
    send_credits: Option<usize>,
    send_failure: Option<String>,
}

/// Server end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Client end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            MemoryTransport {
                shared: shared.clone(),
            },
            MemoryPeer { shared },
        )
    }
}

impl Transport for MemoryTransport {
    fn try_receive(&mut self, container: &mut PayloadContainer) -> Result<TransportStatus> {
        let mut shared = self.shared.lock();
        match shared.inbound.pop_front() {
            Some(payload) => {
                container.fill_from(&payload)?;
                Ok(TransportStatus::Ready)
            }
            None if shared.closed => Err(TracewireError::EndOfStream),
            None => Ok(TransportStatus::NotReady),
        }
    }

    fn try_send(&mut self, payload: &[u8]) -> Result<TransportStatus> {
        let mut shared = self.shared.lock();
        if let Some(reason) = &shared.send_failure {
            return Err(TracewireError::Transport(reason.clone()));
        }
        if shared.closed {
            return Err(TracewireError::EndOfStream);
        }

        if let Some(credits) = shared.send_credits.as_mut() {
            if *credits == 0 {
                return Ok(TransportStatus::NotReady);
            }
            *credits -= 1;
        }
        shared.outbound.push_back(Bytes::copy_from_slice(payload));
        Ok(TransportStatus::Ready)
    }
}

impl MemoryPeer {
    /// Queue a request for the server.
    pub fn send_request(&self, message: &EventMessage) {
        self.send_raw(&message.encode());
    }

    /// Queue raw payload bytes for the server.
    pub fn send_raw(&self, payload: &[u8]) {
        self.shared
            .lock()
            .inbound
            .push_back(Bytes::copy_from_slice(payload));
    }

    /// Close the connection. Queued requests are still delivered first.
    pub fn close(&self) {
        self.shared.lock().closed = true;
    }

    /// Take every payload the server has sent so far.
    pub fn received(&self) -> Vec<Bytes> {
        self.shared.lock().outbound.drain(..).collect()
    }

    /// Take and decode every payload the server has sent so far.
    pub fn received_messages(&self) -> Result<Vec<EventMessage>> {
        self.received()
            .iter()
            .map(|payload| EventMessage::decode(payload))
            .collect()
    }

    /// Number of requests the server has not picked up yet.
    pub fn pending_requests(&self) -> usize {
        self.shared.lock().inbound.len()
    }

    /// Allow only `credits` more sends to succeed; `None` lifts the limit.
    pub fn set_send_credits(&self, credits: Option<usize>) {
        self.shared.lock().send_credits = credits;
    }

    /// Make every send fail with a transport error until cleared.
    pub fn fail_sends(&self, reason: impl Into<String>) {
        self.shared.lock().send_failure = Some(reason.into());
    }

    pub fn clear_send_failure(&self) {
        self.shared.lock().send_failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_reaches_server() {
        let (mut transport, peer) = MemoryTransport::pair();
        let mut container = PayloadContainer::new();

        assert_eq!(
            transport.try_receive(&mut container).unwrap(),
            TransportStatus::NotReady
        );

        peer.send_request(&EventMessage::QueryProvidersRequest);
        assert_eq!(
            transport.try_receive(&mut container).unwrap(),
            TransportStatus::Ready
        );
        assert_eq!(container.decode().unwrap(), EventMessage::QueryProvidersRequest);
    }

    #[test]
    fn test_credits_limit_sends() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.set_send_credits(Some(1));

        assert_eq!(transport.try_send(b"one").unwrap(), TransportStatus::Ready);
        assert_eq!(transport.try_send(b"two").unwrap(), TransportStatus::NotReady);

        peer.set_send_credits(None);
        assert_eq!(transport.try_send(b"two").unwrap(), TransportStatus::Ready);
        assert_eq!(peer.received(), vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    }

    #[test]
    fn test_close_drains_then_ends() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.send_request(&EventMessage::ApplyProviderUpdatesRequest);
        peer.close();
        let mut container = PayloadContainer::new();

        assert!(transport.try_receive(&mut container).is_ok());
        assert!(matches!(
            transport.try_receive(&mut container),
            Err(TracewireError::EndOfStream)
        ));
        assert!(matches!(
            transport.try_send(b"late"),
            Err(TracewireError::EndOfStream)
        ));
    }

    #[test]
    fn test_forced_failure() {
        let (mut transport, peer) = MemoryTransport::pair();
        peer.fail_sends("reset by peer");

        assert!(matches!(
            transport.try_send(b"x"),
            Err(TracewireError::Transport(_))
        ));
        assert!(peer.received().is_empty());

        peer.clear_send_failure();
        assert!(transport.try_send(b"x").is_ok());
    }
}
