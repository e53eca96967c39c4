//! In-memory transfer manager.
//!
//! Block ids are assigned sequentially starting from 1 (0 is the invalid
//! sentinel) and wrap around, skipping ids that are still open.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BlockId, ServerBlock, TransferBlock, TransferManager};

struct Blocks {
    open: HashMap<BlockId, ServerBlock>,
    next_id: u32,
}

/// Transfer manager keeping every open block in memory.
pub struct BlockManager {
    blocks: Mutex<Blocks>,
    max_blocks: Option<usize>,
}

impl BlockManager {
    /// Create a manager without a block limit.
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(Blocks {
                open: HashMap::new(),
                next_id: 1,
            }),
            max_blocks: None,
        }
    }

    /// Create a manager that refuses to open more than `max_blocks` blocks.
    pub fn with_max_blocks(max_blocks: usize) -> Self {
        Self {
            max_blocks: Some(max_blocks),
            ..Self::new()
        }
    }

    /// Number of currently open blocks.
    pub fn open_count(&self) -> usize {
        self.blocks.lock().open.len()
    }
}

impl Default for BlockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferManager for BlockManager {
    fn open_server_block(&self) -> Option<ServerBlock> {
        let mut blocks = self.blocks.lock();

        if let Some(max) = self.max_blocks {
            if blocks.open.len() >= max {
                tracing::debug!(max, "Transfer block limit reached");
                return None;
            }
        }

        // Every id is taken only if u32::MAX - 1 blocks are open
        let mut id = BlockId::new(blocks.next_id);
        while !id.is_valid() || blocks.open.contains_key(&id) {
            id = BlockId::new(id.raw().wrapping_add(1));
        }
        blocks.next_id = id.raw().wrapping_add(1);

        let block = Arc::new(TransferBlock::new(id));
        blocks.open.insert(id, block.clone());
        tracing::trace!(block_id = %id, "Opened transfer block");
        Some(block)
    }

    fn get_block(&self, id: BlockId) -> Option<ServerBlock> {
        self.blocks.lock().open.get(&id).cloned()
    }

    fn close_server_block(&self, block: ServerBlock) {
        let removed = self.blocks.lock().open.remove(&block.id());
        if removed.is_none() {
            tracing::warn!(block_id = %block.id(), "Closing a block that is not open");
        }
    }
}
