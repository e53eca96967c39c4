//! Provider module - instrumentation providers a tool can discover and configure.
//!
//! - [`ProviderRegistry`] - the registry seam the session talks to
//! - [`ProviderTable`] - in-memory registry with per-event enable masks
//! - [`ProviderUpdate`] / [`apply_update_records`] - update block records
//!
//! Descriptors are what a query publishes: the table serializes them with
//! [`MsgPackCodec`](crate::codec::MsgPackCodec) into a discovery block the
//! client reads back by id.

mod table;
mod update;

use serde::{Deserialize, Serialize};

use crate::protocol::ResultCode;
use crate::transfer::BlockId;

pub use table::ProviderTable;
pub use update::{
    apply_update_records, encode_update_block, mask_bit, ApplyOutcome, ProviderUpdate,
    PROVIDER_UPDATE_HEADER_SIZE,
};

/// Registry of event providers, shared by the server and its sessions.
pub trait ProviderRegistry: Send + Sync {
    /// Publish the provider descriptions in a fresh transfer block.
    ///
    /// Returns the block id on success, or the result code to report.
    fn build_query_providers_response(&self) -> Result<BlockId, ResultCode>;

    /// Apply one update record.
    fn apply_provider_update(&self, update: &ProviderUpdate<'_>) -> ResultCode;

    /// Whether events of `event_id` from `provider_id` should be recorded.
    fn is_event_enabled(&self, provider_id: u32, event_id: u32) -> bool;
}

/// Static description of one event a provider can emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl EventDescriptor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Static description of a provider, supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub id: u32,
    pub name: String,
    pub events: Vec<EventDescriptor>,
}

impl ProviderDescriptor {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            events: Vec::new(),
        }
    }

    /// Add an event to the descriptor.
    pub fn with_event(mut self, event: EventDescriptor) -> Self {
        self.events.push(event);
        self
    }

    /// Mask bytes needed to cover every event id of this provider.
    pub fn event_mask_size(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.id as usize / 8 + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Published state of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub descriptor: ProviderDescriptor,
    pub enabled: bool,
    /// Sent as msgpack `bin` rather than an array of integers.
    #[serde(with = "serde_bytes")]
    pub event_mask: Vec<u8>,
}

/// Contents of a discovery block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersDescription {
    pub providers: Vec<ProviderInfo>,
}
