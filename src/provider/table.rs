//! In-memory provider registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::update::mask_bit;
use super::{ProviderDescriptor, ProviderInfo, ProviderRegistry, ProviderUpdate, ProvidersDescription};
use crate::codec::MsgPackCodec;
use crate::error::{Result, TracewireError};
use crate::protocol::ResultCode;
use crate::transfer::{BlockId, ServerBlock, TransferManager};

#[derive(Debug)]
struct ProviderEntry {
    descriptor: ProviderDescriptor,
    enabled: bool,
    event_mask: Vec<u8>,
}

impl ProviderEntry {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            descriptor: self.descriptor.clone(),
            enabled: self.enabled,
            event_mask: self.event_mask.clone(),
        }
    }
}

/// Provider registry backed by a map of registered descriptors.
///
/// Providers start disabled with every event bit clear. Update records
/// switch them on and replace their masks. The table keeps at most one
/// discovery block alive; building a new one closes the previous one.
pub struct ProviderTable {
    transfer: Arc<dyn TransferManager>,
    providers: RwLock<BTreeMap<u32, ProviderEntry>>,
    discovery_block: Mutex<Option<ServerBlock>>,
}

impl ProviderTable {
    /// Create an empty table publishing through `transfer`.
    pub fn new(transfer: Arc<dyn TransferManager>) -> Self {
        Self {
            transfer,
            providers: RwLock::new(BTreeMap::new()),
            discovery_block: Mutex::new(None),
        }
    }

    /// Register a provider.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateProvider` if the id is already taken.
    pub fn register(&self, descriptor: ProviderDescriptor) -> Result<()> {
        let mut providers = self.providers.write();
        if providers.contains_key(&descriptor.id) {
            return Err(TracewireError::DuplicateProvider(descriptor.id));
        }

        tracing::debug!(
            provider_id = descriptor.id,
            name = %descriptor.name,
            events = descriptor.events.len(),
            "Registered provider"
        );
        let event_mask = vec![0u8; descriptor.event_mask_size()];
        providers.insert(
            descriptor.id,
            ProviderEntry {
                descriptor,
                enabled: false,
                event_mask,
            },
        );
        Ok(())
    }

    /// Remove a provider, returning its descriptor.
    pub fn unregister(&self, provider_id: u32) -> Option<ProviderDescriptor> {
        self.providers
            .write()
            .remove(&provider_id)
            .map(|entry| entry.descriptor)
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Current state of every provider, ordered by id.
    pub fn describe(&self) -> ProvidersDescription {
        ProvidersDescription {
            providers: self.providers.read().values().map(ProviderEntry::info).collect(),
        }
    }

    /// Current state of one provider.
    pub fn provider(&self, provider_id: u32) -> Option<ProviderInfo> {
        self.providers.read().get(&provider_id).map(ProviderEntry::info)
    }

    /// Id of the live discovery block, if a query has built one.
    pub fn discovery_block_id(&self) -> Option<BlockId> {
        self.discovery_block.lock().as_ref().map(|block| block.id())
    }
}

impl ProviderRegistry for ProviderTable {
    fn build_query_providers_response(&self) -> std::result::Result<BlockId, ResultCode> {
        let encoded = MsgPackCodec::encode(&self.describe()).map_err(|e| {
            tracing::error!("Failed to encode provider descriptions: {}", e);
            ResultCode::Error
        })?;

        let block = self.transfer.open_server_block().ok_or_else(|| {
            tracing::warn!("No transfer block available for provider discovery");
            ResultCode::InsufficientMemory
        })?;
        block.replace(&encoded);
        let block_id = block.id();

        if let Some(previous) = self.discovery_block.lock().replace(block) {
            self.transfer.close_server_block(previous);
        }

        tracing::debug!(%block_id, size = encoded.len(), "Built provider discovery block");
        Ok(block_id)
    }

    fn apply_provider_update(&self, update: &ProviderUpdate<'_>) -> ResultCode {
        let mut providers = self.providers.write();
        let Some(entry) = providers.get_mut(&update.provider_id) else {
            tracing::warn!(provider_id = update.provider_id, "Update for unknown provider");
            return ResultCode::InvalidParameter;
        };

        // An empty mask toggles the provider and keeps its event selection.
        if !update.event_mask.is_empty() {
            let expected = entry.descriptor.event_mask_size();
            if update.event_mask.len() != expected {
                tracing::warn!(
                    provider_id = update.provider_id,
                    mask_size = update.event_mask.len(),
                    expected,
                    "Update mask size mismatch"
                );
                return ResultCode::InvalidParameter;
            }
            entry.event_mask.clear();
            entry.event_mask.extend_from_slice(update.event_mask);
        }
        entry.enabled = update.enabled;

        tracing::debug!(
            provider_id = update.provider_id,
            enabled = update.enabled,
            "Applied provider update"
        );
        ResultCode::Success
    }

    fn is_event_enabled(&self, provider_id: u32, event_id: u32) -> bool {
        self.providers
            .read()
            .get(&provider_id)
            .is_some_and(|entry| entry.enabled && mask_bit(&entry.event_mask, event_id))
    }
}

impl Drop for ProviderTable {
    fn drop(&mut self) {
        if let Some(block) = self.discovery_block.get_mut().take() {
            self.transfer.close_server_block(block);
        }
    }
}
