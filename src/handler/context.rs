//! Context passed to command handlers.

use crate::provider::ProviderRegistry;
use crate::transfer::{ServerBlock, TransferManager};

/// What a handler may touch while answering one request.
///
/// Built fresh by the session for every dispatch. The update block slot is
/// borrowed mutably so Allocate can fill it; the session still owns the
/// block and closes it on drop.
pub struct HandlerContext<'a> {
    /// Session the request arrived on (for logging).
    pub session_id: u64,
    pub registry: &'a dyn ProviderRegistry,
    pub transfer: &'a dyn TransferManager,
    /// The session's provider update block, if one is open.
    pub update_block: &'a mut Option<ServerBlock>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        session_id: u64,
        registry: &'a dyn ProviderRegistry,
        transfer: &'a dyn TransferManager,
        update_block: &'a mut Option<ServerBlock>,
    ) -> Self {
        Self {
            session_id,
            registry,
            transfer,
            update_block,
        }
    }

    #[inline]
    pub fn has_update_block(&self) -> bool {
        self.update_block.is_some()
    }
}
