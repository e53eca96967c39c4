//! FIFO queue of chunks waiting to be streamed.
//!
//! Producers push from any thread. A single session consumes: it peeks the
//! front entry, sends a slice of it, then advances that entry's progress.
//! Entries leave the queue only from the front and only once fully sent, so
//! bytes reach the transport in enqueue order.

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::EventChunk;

/// Queue entry tracking how much of one chunk has been sent.
#[derive(Debug)]
pub struct EventChunkInfo {
    chunk: EventChunk,
    bytes_sent: usize,
}

impl EventChunkInfo {
    fn new(chunk: EventChunk) -> Self {
        Self {
            chunk,
            bytes_sent: 0,
        }
    }

    #[inline]
    pub fn chunk(&self) -> &EventChunk {
        &self.chunk
    }

    #[inline]
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Bytes of the chunk not yet sent.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.chunk.data_size() - self.bytes_sent
    }

    /// The unsent tail of the chunk.
    #[inline]
    pub fn unsent(&self) -> &[u8] {
        &self.chunk.data()[self.bytes_sent..]
    }
}

/// Ordered queue of chunks shared between producers and one consumer.
///
/// Every entry has unsent bytes: empty chunks are refused on push and an
/// entry leaves the queue once `advance_front` accounts its last byte.
#[derive(Debug, Default)]
pub struct EventChunkQueue {
    entries: Mutex<VecDeque<EventChunkInfo>>,
}

impl EventChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filled chunk.
    ///
    /// Empty chunks are handed back so the caller can return them to the
    /// pool; they would otherwise sit at the front with nothing to send.
    pub fn push(&self, chunk: EventChunk) -> Result<(), EventChunk> {
        if chunk.is_empty() {
            return Err(chunk);
        }
        self.entries.lock().push_back(EventChunkInfo::new(chunk));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Total unsent bytes across all queued chunks.
    pub fn pending_bytes(&self) -> usize {
        self.entries.lock().iter().map(EventChunkInfo::remaining).sum()
    }

    /// Run `f` on the front entry.
    ///
    /// Returns `None` if the queue is empty. The queue is locked while `f`
    /// runs, so `f` must not touch the queue again.
    pub fn with_front<R>(&self, f: impl FnOnce(&EventChunkInfo) -> R) -> Option<R> {
        self.entries.lock().front().map(f)
    }

    /// Record `n` more bytes of the front chunk as sent.
    ///
    /// Returns the chunk once it is fully sent; it has then left the queue
    /// and belongs to the caller.
    pub fn advance_front(&self, n: usize) -> Option<EventChunk> {
        let mut entries = self.entries.lock();
        let front = entries.front_mut()?;

        debug_assert!(n <= front.remaining());
        front.bytes_sent += n.min(front.remaining());

        if front.remaining() == 0 {
            entries.pop_front().map(|info| info.chunk)
        } else {
            None
        }
    }

    /// Remove every entry, front first.
    pub fn drain(&self) -> Vec<EventChunk> {
        self.entries
            .lock()
            .drain(..)
            .map(|info| info.chunk)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(bytes: &[u8]) -> EventChunk {
        let mut chunk = EventChunk::with_capacity(bytes.len().max(1));
        chunk.write(bytes);
        chunk
    }

    #[test]
    fn test_push_rejects_empty_chunk() {
        let queue = EventChunkQueue::new();
        let rejected = queue.push(EventChunk::with_capacity(8));

        assert!(rejected.is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_front_is_first_pushed() {
        let queue = EventChunkQueue::new();
        queue.push(chunk(b"first")).unwrap();
        queue.push(chunk(b"second")).unwrap();

        let front = queue.with_front(|info| info.unsent().to_vec());
        assert_eq!(front.as_deref(), Some(&b"first"[..]));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_bytes(), 11);
    }

    #[test]
    fn test_advance_partial_keeps_entry() {
        let queue = EventChunkQueue::new();
        queue.push(chunk(b"abcdef")).unwrap();

        assert!(queue.advance_front(2).is_none());

        let (sent, unsent) = queue
            .with_front(|info| (info.bytes_sent(), info.unsent().to_vec()))
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(unsent, b"cdef");
    }

    #[test]
    fn test_advance_to_end_pops_entry() {
        let queue = EventChunkQueue::new();
        queue.push(chunk(b"abc")).unwrap();
        queue.push(chunk(b"def")).unwrap();

        assert!(queue.advance_front(1).is_none());
        let done = queue.advance_front(2).unwrap();

        assert_eq!(done.data(), b"abc");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.with_front(|info| info.bytes_sent()), Some(0));
    }

    #[test]
    fn test_front_always_has_unsent_bytes() {
        let queue = EventChunkQueue::new();
        assert!(queue.push(EventChunk::with_capacity(4)).is_err());
        queue.push(chunk(b"ab")).unwrap();
        queue.push(chunk(b"c")).unwrap();

        assert!(queue.advance_front(0).is_none());
        assert_eq!(queue.with_front(|info| info.remaining()), Some(2));

        assert!(queue.advance_front(2).is_some());
        assert_eq!(queue.with_front(|info| info.remaining()), Some(1));
        assert!(queue.advance_front(1).is_some());
        assert!(queue.with_front(|info| info.remaining()).is_none());
    }

    #[test]
    fn test_advance_on_empty_queue() {
        let queue = EventChunkQueue::new();
        assert!(queue.advance_front(1).is_none());
        assert!(queue.with_front(|info| info.remaining()).is_none());
    }

    #[test]
    fn test_drain_preserves_order() {
        let queue = EventChunkQueue::new();
        queue.push(chunk(b"1")).unwrap();
        queue.push(chunk(b"2")).unwrap();

        let drained: Vec<Vec<u8>> = queue.drain().iter().map(|c| c.data().to_vec()).collect();
        assert_eq!(drained, vec![b"1".to_vec(), b"2".to_vec()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        use std::sync::Arc;

        let queue = Arc::new(EventChunkQueue::new());
        let handles: Vec<_> = (0..4u8)
            .map(|producer| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for seq in 0..50u8 {
                        queue.push(chunk(&[producer, seq])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seq = [None::<u8>; 4];
        for chunk in queue.drain() {
            let (producer, seq) = (chunk.data()[0] as usize, chunk.data()[1]);
            if let Some(prev) = last_seq[producer] {
                assert!(seq > prev);
            }
            last_seq[producer] = Some(seq);
        }
        assert!(last_seq.iter().all(|s| *s == Some(49)));
    }
}
