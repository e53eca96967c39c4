//! Session module - one client connection driven by a single-step pump.
//!
//! A [`Session`] cycles through receive, process and send. While no request
//! is waiting it streams queued event chunks to the client, slicing each
//! chunk into event data payloads and resuming mid-chunk whenever the
//! transport pushes back.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tracewire::protocol::EventMessage;
//! use tracewire::transfer::BlockManager;
//! use tracewire::transport::MemoryTransport;
//! use tracewire::{EventServer, ProviderTable, ServerConfig};
//!
//! let transfer = Arc::new(BlockManager::new());
//! let registry = Arc::new(ProviderTable::new(transfer.clone()));
//! let server = EventServer::new(ServerConfig::default(), registry, transfer).unwrap();
//!
//! let (transport, peer) = MemoryTransport::pair();
//! let mut session = server.accept_session(transport).unwrap();
//!
//! peer.send_request(&EventMessage::AllocateProviderUpdatesRequest);
//! for _ in 0..3 {
//!     session.pump().unwrap();
//! }
//! assert_eq!(peer.received_messages().unwrap().len(), 1);
//! ```

mod state;

use std::sync::Arc;

pub use state::{SessionState, StepEvent};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::handler::{self, HandlerContext};
use crate::protocol::{PayloadContainer, EVENT_DATA_SIZE_FIELD, EVENT_HEADER_SIZE};
use crate::server::EventServer;
use crate::transfer::{BlockId, ServerBlock};
use crate::transport::{Transport, TransportStatus};

/// Counters kept by a session over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Requests dispatched to a handler.
    pub requests_handled: u64,
    /// Responses the transport accepted.
    pub responses_sent: u64,
    /// Event data payloads the transport accepted.
    pub event_payloads_sent: u64,
    /// Event bytes carried by those payloads.
    pub event_bytes_sent: u64,
    /// Chunks fully accounted and returned to the pool.
    pub chunks_completed: u64,
    /// Requests dropped as protocol violations.
    pub protocol_violations: u64,
}

/// Server side of one client connection.
///
/// Created by [`EventServer::accept_session`]. Dropping the session closes
/// its update block and frees the server's session slot; chunks it has not
/// drained stay queued for the next session.
pub struct Session<T: Transport> {
    id: u64,
    transport: T,
    server: Arc<EventServer>,
    state: SessionState,
    /// Request in, response out.
    payload: PayloadContainer,
    /// Last event data payload built from the chunk queue.
    event_payload: PayloadContainer,
    /// `event_payload` holds a slice the transport has not taken yet.
    event_payload_pending: bool,
    update_block: Option<ServerBlock>,
    config: SessionConfig,
    stats: SessionStats,
    idle: bool,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(id: u64, transport: T, server: Arc<EventServer>) -> Self {
        let config = server.config().session;
        Self {
            id,
            transport,
            server,
            state: SessionState::default(),
            payload: PayloadContainer::new(),
            event_payload: PayloadContainer::new(),
            event_payload_pending: false,
            update_block: None,
            config,
            stats: SessionStats::default(),
            idle: false,
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Whether the last pump made no progress.
    ///
    /// Drivers use this to back off instead of spinning.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// Whether an event data payload is waiting to be retried.
    #[inline]
    pub fn has_pending_event_data(&self) -> bool {
        self.event_payload_pending
    }

    /// Id of the open provider update block.
    pub fn update_block_id(&self) -> Option<BlockId> {
        self.update_block.as_ref().map(|block| block.id())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Advance the session by one step. Never blocks.
    ///
    /// # Errors
    ///
    /// - `EndOfStream`, `Io`, `Transport` from the transport; the state is
    ///   unchanged and the session should be dropped
    /// - `UnknownCommand`, `UnexpectedCommand` for a request that cannot be
    ///   routed; it has been dropped and the session keeps serving
    pub fn pump(&mut self) -> Result<()> {
        self.idle = false;
        match self.state {
            SessionState::ReceivePayload => self.receive_payload(),
            SessionState::ProcessPayload => self.process_payload(),
            SessionState::SendPayload => self.send_payload(),
        }
    }

    fn receive_payload(&mut self) -> Result<()> {
        match self.transport.try_receive(&mut self.payload)? {
            TransportStatus::Ready => {
                self.state = self.state.next(StepEvent::Received);
            }
            TransportStatus::NotReady => {
                let sent = self.send_event_data()?;
                self.idle = sent == 0;
                self.state = self.state.next(StepEvent::ReceiveNotReady);
            }
        }
        Ok(())
    }

    fn process_payload(&mut self) -> Result<()> {
        let mut ctx = HandlerContext::new(
            self.id,
            self.server.registry(),
            self.server.transfer(),
            &mut self.update_block,
        );

        match handler::dispatch(&mut ctx, &mut self.payload) {
            Ok(next) => {
                debug_assert_eq!(next, self.state.next(StepEvent::Handled));
                self.stats.requests_handled += 1;
                self.state = next;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    session_id = self.id,
                    size = self.payload.payload_size(),
                    "Dropping request: {}",
                    e
                );
                self.stats.protocol_violations += 1;
                self.payload.clear();
                self.state = self.state.next(StepEvent::Rejected);
                Err(e)
            }
        }
    }

    fn send_payload(&mut self) -> Result<()> {
        match self.transport.try_send(self.payload.as_bytes())? {
            TransportStatus::Ready => {
                self.stats.responses_sent += 1;
                self.payload.clear();
                self.state = self.state.next(StepEvent::Sent);
            }
            TransportStatus::NotReady => {
                self.idle = true;
                self.state = self.state.next(StepEvent::SendNotReady);
            }
        }
        Ok(())
    }

    /// Drain queued event chunks into the transport.
    ///
    /// Returns the number of event payloads the transport took.
    fn send_event_data(&mut self) -> Result<usize> {
        let mut sent = 0;

        if self.event_payload_pending {
            match self.transport.try_send(self.event_payload.as_bytes())? {
                TransportStatus::Ready => {
                    self.event_payload_pending = false;
                    self.record_event_payload();
                    sent += 1;
                }
                TransportStatus::NotReady => return Ok(0),
            }
        }

        let server = Arc::clone(&self.server);
        let queue = server.chunk_queue();

        while sent < self.config.max_event_sends_per_pump {
            let Some(remaining) = queue.with_front(|info| info.remaining()) else {
                break;
            };

            // The queue pops entries as soon as they are fully sent.
            debug_assert!(remaining > 0);

            let slice_len = remaining.min(self.config.max_event_data_size);
            let event_payload = &mut self.event_payload;
            queue.with_front(|info| event_payload.create_event_data(&info.unsent()[..slice_len]));

            match self.transport.try_send(self.event_payload.as_bytes()) {
                Ok(TransportStatus::Ready) => {
                    self.record_event_payload();
                    self.advance_front(slice_len);
                    sent += 1;
                }
                Ok(TransportStatus::NotReady) => {
                    // The slice now lives in the pending payload, so the
                    // chunk is accounted as sent up to its end.
                    self.event_payload_pending = true;
                    self.advance_front(slice_len);
                    break;
                }
                Err(e) => {
                    self.event_payload.clear();
                    return Err(e);
                }
            }
        }

        Ok(sent)
    }

    fn advance_front(&mut self, n: usize) {
        if let Some(chunk) = self.server.chunk_queue().advance_front(n) {
            self.server.chunk_pool().free(chunk);
            self.stats.chunks_completed += 1;
        }
    }

    fn record_event_payload(&mut self) {
        let data_len = self
            .event_payload
            .payload_size()
            .saturating_sub(EVENT_HEADER_SIZE + EVENT_DATA_SIZE_FIELD);
        self.stats.event_payloads_sent += 1;
        self.stats.event_bytes_sent += data_len as u64;
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(block) = self.update_block.take() {
            tracing::debug!(session_id = self.id, block_id = %block.id(), "Closing update block");
            self.server.transfer().close_server_block(block);
        }
        if self.event_payload_pending {
            tracing::debug!(
                session_id = self.id,
                size = self.event_payload.payload_size(),
                "Discarding unsent event payload"
            );
        }
        self.server.release_session(self.id);
        tracing::info!(
            session_id = self.id,
            requests = self.stats.requests_handled,
            event_bytes = self.stats.event_bytes_sent,
            "Session closed"
        );
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("event_payload_pending", &self.event_payload_pending)
            .field("update_block", &self.update_block_id())
            .field("stats", &self.stats)
            .finish()
    }
}
