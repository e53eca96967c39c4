//! Event server - shared state behind every session.
//!
//! The server owns the provider registry, the transfer manager, and the
//! chunk pool and queue. Producers call [`EventServer::write_event`] from any
//! thread; the active [`Session`] drains what they queued.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tracewire::provider::{EventDescriptor, ProviderDescriptor, ProviderRegistry, ProviderUpdate};
//! use tracewire::transfer::BlockManager;
//! use tracewire::{EventServer, ProviderTable, ServerConfig};
//!
//! let transfer = Arc::new(BlockManager::new());
//! let table = Arc::new(ProviderTable::new(transfer.clone()));
//! table
//!     .register(ProviderDescriptor::new(1, "gpu").with_event(EventDescriptor::new(0, "submit")))
//!     .unwrap();
//! let server = EventServer::new(ServerConfig::default(), table.clone(), transfer).unwrap();
//!
//! // Disabled providers are filtered out.
//! assert!(!server.write_event(1, 0, b"frame 1").unwrap());
//!
//! table.apply_provider_update(&ProviderUpdate::new(1, true, &[1]));
//! assert!(server.write_event(1, 0, b"frame 2").unwrap());
//! server.flush_events();
//! assert_eq!(server.chunk_queue().len(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunk::{EventChunk, EventChunkPool, EventChunkQueue};
use crate::config::ServerConfig;
use crate::error::{Result, TracewireError};
use crate::protocol::{EventRecordHeader, EVENT_RECORD_HEADER_SIZE};
use crate::provider::ProviderRegistry;
use crate::session::Session;
use crate::transfer::TransferManager;
use crate::transport::Transport;

/// Shared state for the sessions of one event stream.
pub struct EventServer {
    config: ServerConfig,
    registry: Arc<dyn ProviderRegistry>,
    transfer: Arc<dyn TransferManager>,
    chunk_queue: EventChunkQueue,
    chunk_pool: EventChunkPool,
    /// Partially filled chunk `write_event` appends to.
    writer: Mutex<Option<EventChunk>>,
    /// Id of the session draining the queue.
    active_session: Mutex<Option<u64>>,
    next_session_id: AtomicU64,
}

impl EventServer {
    /// Create a server.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `config` does not validate.
    pub fn new(
        config: ServerConfig,
        registry: Arc<dyn ProviderRegistry>,
        transfer: Arc<dyn TransferManager>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let chunk_pool = match config.max_chunks {
            Some(max) => EventChunkPool::with_max_chunks(config.chunk_size, max),
            None => EventChunkPool::new(config.chunk_size),
        };

        Ok(Arc::new(Self {
            config,
            registry,
            transfer,
            chunk_queue: EventChunkQueue::new(),
            chunk_pool,
            writer: Mutex::new(None),
            active_session: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }))
    }

    /// Start a session on `transport`.
    ///
    /// # Errors
    ///
    /// Returns `SessionLimit` while another session is alive; the queue has
    /// a single consumer.
    pub fn accept_session<T: Transport>(self: &Arc<Self>, transport: T) -> Result<Session<T>> {
        let mut active = self.active_session.lock();
        if let Some(current) = *active {
            tracing::warn!(active_session = current, "Rejecting session: one already active");
            return Err(TracewireError::SessionLimit);
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        *active = Some(id);
        tracing::info!(session_id = id, queued_chunks = self.chunk_queue.len(), "Session opened");

        Ok(Session::new(id, transport, Arc::clone(self)))
    }

    pub(crate) fn release_session(&self, id: u64) {
        let mut active = self.active_session.lock();
        if *active == Some(id) {
            *active = None;
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.active_session.lock().is_some()
    }

    #[inline]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &dyn ProviderRegistry {
        self.registry.as_ref()
    }

    #[inline]
    pub fn transfer(&self) -> &dyn TransferManager {
        self.transfer.as_ref()
    }

    #[inline]
    pub fn chunk_queue(&self) -> &EventChunkQueue {
        &self.chunk_queue
    }

    #[inline]
    pub fn chunk_pool(&self) -> &EventChunkPool {
        &self.chunk_pool
    }

    /// Take an empty chunk to fill and hand to [`enqueue_chunk`](Self::enqueue_chunk).
    pub fn allocate_chunk(&self) -> Option<EventChunk> {
        self.chunk_pool.allocate()
    }

    /// Queue a chunk filled by the caller.
    ///
    /// Events buffered by `write_event` are queued first so the stream keeps
    /// call order. An empty chunk goes straight back to the pool. A chunk
    /// built with [`EventChunk::with_capacity`] is streamed like any other
    /// and dropped once sent.
    pub fn enqueue_chunk(&self, chunk: EventChunk) {
        let mut writer = self.writer.lock();
        if let Some(partial) = writer.take() {
            self.push_chunk(partial);
        }
        self.push_chunk(chunk);
    }

    /// Record one event if its provider has it enabled.
    ///
    /// The record (header then payload) is packed into pool chunks and may
    /// span several of them. Full chunks are queued immediately; the last
    /// one waits for more events or [`flush_events`](Self::flush_events).
    ///
    /// Returns `false` if the event is disabled.
    ///
    /// # Errors
    ///
    /// - `PoolExhausted` if the chunks the record needs cannot all be
    ///   allocated; nothing is written in that case
    /// - `Protocol` if the payload is longer than `u32::MAX`
    pub fn write_event(&self, provider_id: u32, event_id: u32, payload: &[u8]) -> Result<bool> {
        if !self.registry.is_event_enabled(provider_id, event_id) {
            return Ok(false);
        }

        let payload_size = u32::try_from(payload.len()).map_err(|_| {
            TracewireError::Protocol(format!("event payload of {} bytes", payload.len()))
        })?;
        let header = EventRecordHeader::new(provider_id, event_id, payload_size).encode();
        let record_len = EVENT_RECORD_HEADER_SIZE + payload.len();

        let mut writer = self.writer.lock();

        // Reserve every chunk up front so a record is never half written.
        let available = writer.as_ref().map_or(0, EventChunk::remaining_capacity);
        let needed = record_len
            .saturating_sub(available)
            .div_ceil(self.chunk_pool.chunk_size());
        let mut fresh = Vec::with_capacity(needed);
        for _ in 0..needed {
            match self.chunk_pool.allocate() {
                Some(chunk) => fresh.push(chunk),
                None => {
                    for chunk in fresh {
                        self.chunk_pool.free(chunk);
                    }
                    tracing::debug!(provider_id, event_id, record_len, "Chunk pool exhausted");
                    return Err(TracewireError::PoolExhausted);
                }
            }
        }

        let mut fresh = fresh.into_iter();
        self.pack(&mut writer, &mut fresh, &header);
        self.pack(&mut writer, &mut fresh, payload);
        debug_assert!(fresh.next().is_none());

        Ok(true)
    }

    /// Queue the partially filled chunk, if any.
    ///
    /// Returns whether a chunk was queued.
    pub fn flush_events(&self) -> bool {
        match self.writer.lock().take() {
            Some(chunk) if !chunk.is_empty() => {
                self.push_chunk(chunk);
                true
            }
            Some(chunk) => {
                self.chunk_pool.free(chunk);
                false
            }
            None => false,
        }
    }

    /// Unsent bytes across the queue (the writer's chunk excluded).
    pub fn pending_event_bytes(&self) -> usize {
        self.chunk_queue.pending_bytes()
    }

    fn pack(
        &self,
        current: &mut Option<EventChunk>,
        fresh: &mut impl Iterator<Item = EventChunk>,
        mut bytes: &[u8],
    ) {
        while !bytes.is_empty() {
            if current.is_none() {
                *current = fresh.next();
            }
            let Some(chunk) = current.as_mut() else {
                tracing::error!(left = bytes.len(), "Ran out of reserved chunks");
                return;
            };

            let n = chunk.write(bytes);
            bytes = &bytes[n..];
            if chunk.is_full() {
                if let Some(full) = current.take() {
                    self.push_chunk(full);
                }
            }
        }
    }

    fn push_chunk(&self, chunk: EventChunk) {
        if let Err(empty) = self.chunk_queue.push(chunk) {
            self.chunk_pool.free(empty);
        }
    }
}

impl std::fmt::Debug for EventServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventServer")
            .field("config", &self.config)
            .field("queued_chunks", &self.chunk_queue.len())
            .field("active_session", &*self.active_session.lock())
            .finish()
    }
}
