//! Transfer module - bulk byte blocks shared with the peer.
//!
//! Blocks carry data that does not fit in a single payload: the serialized
//! provider descriptors returned by a query, and the provider update records
//! written by the client before it asks the server to apply them.
//!
//! - [`TransferManager`] - opens, looks up and closes blocks
//! - [`BlockManager`] - in-memory manager with optional block limit
//! - [`TransferBlock`] - one numbered, growable byte buffer

mod block_manager;

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;

pub use block_manager::BlockManager;

/// Identifier of a transfer block (0 is the invalid sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// Sentinel sent to the peer when no block is available.
    pub const INVALID: BlockId = BlockId(0);

    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numbered byte buffer managed by a [`TransferManager`].
#[derive(Debug)]
pub struct TransferBlock {
    id: BlockId,
    data: RwLock<BytesMut>,
}

/// Shared handle to an open block.
pub type ServerBlock = Arc<TransferBlock>;

impl TransferBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            data: RwLock::new(BytesMut::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Current size of the block data in bytes.
    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    /// Append bytes to the block.
    pub fn write(&self, bytes: &[u8]) {
        self.data.write().extend_from_slice(bytes);
    }

    /// Replace the block contents.
    pub fn replace(&self, bytes: &[u8]) {
        let mut data = self.data.write();
        data.clear();
        data.extend_from_slice(bytes);
    }

    /// Copy of the block contents at this instant.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data.read())
    }
}

/// Manager of transfer blocks shared by the server and its sessions.
pub trait TransferManager: Send + Sync {
    /// Open a fresh block for writing.
    ///
    /// Returns `None` if no block can be opened.
    fn open_server_block(&self) -> Option<ServerBlock>;

    /// Look up an open block by id.
    fn get_block(&self, id: BlockId) -> Option<ServerBlock>;

    /// Release a block. The id becomes invalid for later lookups.
    fn close_server_block(&self, block: ServerBlock);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_sentinel() {
        assert!(!BlockId::INVALID.is_valid());
        assert!(BlockId::new(1).is_valid());
        assert_eq!(BlockId::new(7).raw(), 7);
    }

    #[test]
    fn test_block_write_and_snapshot() {
        let block = TransferBlock::new(BlockId::new(3));
        block.write(b"abc");
        block.write(b"def");

        assert_eq!(block.size(), 6);
        assert_eq!(&block.snapshot()[..], b"abcdef");

        block.replace(b"xy");
        assert_eq!(&block.snapshot()[..], b"xy");
    }
}
