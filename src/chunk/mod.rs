//! Event chunks - fixed-capacity buffers of raw event bytes.
//!
//! Producers take a chunk from the [`EventChunkPool`], fill it and push it
//! onto the [`EventChunkQueue`]. The session draining the queue returns each
//! chunk to the pool once every one of its bytes has been accounted as sent.

mod pool;
mod queue;

pub use pool::{EventChunkPool, DEFAULT_CHUNK_SIZE};
pub use queue::{EventChunkInfo, EventChunkQueue};

/// Fixed-capacity byte buffer with a tracked fill size.
#[derive(Debug)]
pub struct EventChunk {
    data: Box<[u8]>,
    data_size: usize,
    /// Id of the pool that handed the chunk out.
    pool_id: Option<u64>,
}

impl EventChunk {
    /// Create an empty chunk holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            data_size: 0,
            pool_id: None,
        }
    }

    /// Whether the chunk was allocated by a pool rather than built by hand.
    #[inline]
    pub fn is_pooled(&self) -> bool {
        self.pool_id.is_some()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// The filled part of the chunk.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_size]
    }

    #[inline]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity() - self.data_size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data_size == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data_size == self.capacity()
    }

    /// Copy as much of `bytes` as fits and return the number copied.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining_capacity());
        self.data[self.data_size..self.data_size + n].copy_from_slice(&bytes[..n]);
        self.data_size += n;
        n
    }

    /// Forget the written bytes. Capacity is kept.
    pub fn reset(&mut self) {
        self.data_size = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_tracks_size() {
        let mut chunk = EventChunk::with_capacity(8);
        assert!(chunk.is_empty());

        assert_eq!(chunk.write(b"abc"), 3);
        assert_eq!(chunk.data(), b"abc");
        assert_eq!(chunk.remaining_capacity(), 5);
    }

    #[test]
    fn test_write_stops_at_capacity() {
        let mut chunk = EventChunk::with_capacity(4);

        assert_eq!(chunk.write(b"abcdef"), 4);
        assert!(chunk.is_full());
        assert_eq!(chunk.write(b"g"), 0);
        assert_eq!(chunk.data(), b"abcd");
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut chunk = EventChunk::with_capacity(4);
        chunk.write(b"ab");
        chunk.reset();

        assert!(chunk.is_empty());
        assert_eq!(chunk.capacity(), 4);
    }
}
