//! Outbound byte window for stream transports.
//!
//! A stream transport buffers encoded frames until the socket takes them.
//! The [`SendWindow`] bounds that buffer: once the buffered byte count
//! reaches the window, sends report not-ready and the session retries later.
//!
//! An empty buffer always accepts one frame, so a window smaller than a
//! frame slows the sender down but never wedges it.

use crate::config::DEFAULT_SEND_WINDOW;

/// Byte accounting for one outbound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    /// Bytes buffered and not yet written.
    pending: usize,
    /// Bytes that may be buffered.
    max_pending: usize,
}

impl SendWindow {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: 0,
            max_pending,
        }
    }

    /// Whether a frame of `len` bytes fits right now.
    #[inline]
    pub fn can_accept(&self, len: usize) -> bool {
        self.pending == 0 || self.pending + len <= self.max_pending
    }

    /// Whether the window is full.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.pending >= self.max_pending
    }

    #[inline]
    pub fn pending_bytes(&self) -> usize {
        self.pending
    }

    #[inline]
    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    #[inline]
    pub fn available_capacity(&self) -> usize {
        self.max_pending.saturating_sub(self.pending)
    }

    /// Account `len` bytes if they fit.
    ///
    /// Returns `false` and leaves the window unchanged otherwise.
    pub fn try_reserve(&mut self, len: usize) -> bool {
        if !self.can_accept(len) {
            return false;
        }
        self.pending += len;
        true
    }

    /// Release `len` bytes that reached the socket.
    #[inline]
    pub fn release(&mut self, len: usize) {
        debug_assert!(len <= self.pending);
        self.pending = self.pending.saturating_sub(len);
    }

    pub fn reset(&mut self) {
        self.pending = 0;
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_WINDOW)
    }
}
