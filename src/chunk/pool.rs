//! Chunk pool shared by producers and the draining session.
//!
//! Freed chunks are kept on a free list and handed out again, so a steady
//! event stream does not allocate. An optional limit bounds the number of
//! chunks alive at once; when it is reached producers get `None` and must
//! drop or retry their events.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::EventChunk;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Default chunk capacity in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Pool of reusable event chunks.
#[derive(Debug)]
pub struct EventChunkPool {
    id: u64,
    chunk_size: usize,
    max_chunks: Option<usize>,
    free: Mutex<Vec<EventChunk>>,
    /// Chunks currently handed out (allocated and not yet freed).
    outstanding: AtomicUsize,
}

impl EventChunkPool {
    /// Create an unbounded pool of `chunk_size` byte chunks.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            chunk_size,
            max_chunks: None,
            free: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Create a pool that hands out at most `max_chunks` chunks at a time.
    pub fn with_max_chunks(chunk_size: usize, max_chunks: usize) -> Self {
        Self {
            max_chunks: Some(max_chunks),
            ..Self::new(chunk_size)
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks handed out and not yet freed.
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Number of chunks waiting on the free list.
    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Take an empty chunk from the pool.
    ///
    /// Returns `None` if the pool is at its limit.
    pub fn allocate(&self) -> Option<EventChunk> {
        let mut free = self.free.lock();

        if let Some(max) = self.max_chunks {
            if self.outstanding.load(Ordering::Acquire) >= max {
                return None;
            }
        }
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let mut chunk = free
            .pop()
            .unwrap_or_else(|| EventChunk::with_capacity(self.chunk_size));
        chunk.pool_id = Some(self.id);
        Some(chunk)
    }

    /// Return a chunk to the pool.
    ///
    /// Chunks this pool did not hand out are dropped without touching the
    /// outstanding count.
    pub fn free(&self, mut chunk: EventChunk) {
        if chunk.pool_id != Some(self.id) {
            tracing::trace!(capacity = chunk.capacity(), "Dropping chunk from outside the pool");
            return;
        }
        chunk.reset();
        let mut free = self.free.lock();
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        free.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_gives_empty_chunk_of_configured_size() {
        let pool = EventChunkPool::new(128);
        let chunk = pool.allocate().unwrap();

        assert_eq!(chunk.capacity(), 128);
        assert!(chunk.is_empty());
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn test_free_recycles_and_resets() {
        let pool = EventChunkPool::new(16);
        let mut chunk = pool.allocate().unwrap();
        chunk.write(b"leftover");

        pool.free(chunk);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.free_count(), 1);

        let reused = pool.allocate().unwrap();
        assert!(reused.is_empty());
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_limit() {
        let pool = EventChunkPool::with_max_chunks(16, 2);
        let a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();

        assert!(pool.allocate().is_none());

        pool.free(a);
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn test_foreign_chunk_not_recycled() {
        let pool = EventChunkPool::with_max_chunks(16, 1);
        let held = pool.allocate().unwrap();

        pool.free(EventChunk::with_capacity(32));
        pool.free(EventChunk::with_capacity(16));

        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.free_count(), 0);
        assert!(pool.allocate().is_none());

        pool.free(held);
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.allocate().is_some());
    }

    #[test]
    fn test_chunk_from_other_pool_not_counted() {
        let ours = EventChunkPool::new(16);
        let theirs = EventChunkPool::new(16);
        let chunk = theirs.allocate().unwrap();
        assert!(chunk.is_pooled());

        ours.free(chunk);

        assert_eq!(ours.outstanding(), 0);
        assert_eq!(ours.free_count(), 0);
        assert_eq!(theirs.outstanding(), 1);
    }
}
