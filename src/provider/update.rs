//! Provider update records and the block walk that applies them.
//!
//! An update block is a plain sequence of records with no count in front:
//! ```text
//! ┌─────────────┬─────────┬──────────┬─────────────────┬──────────────┐
//! │ Provider ID │ Enabled │ Reserved │ Event mask size │ Event mask   │
//! │ uint32 BE   │ u8      │ 3 bytes  │ uint32 BE       │ N bytes      │
//! └─────────────┴─────────┴──────────┴─────────────────┴──────────────┘
//! ```
//! Each record's length is `PROVIDER_UPDATE_HEADER_SIZE + N`, which is how
//! the walk finds the next record. Bit `e % 8` of mask byte `e / 8` enables
//! event `e`.

use bytes::{BufMut, BytesMut};

use super::ProviderRegistry;
use crate::error::{Result, TracewireError};
use crate::protocol::ResultCode;

/// Size of the fixed part of a provider update record.
pub const PROVIDER_UPDATE_HEADER_SIZE: usize = 12;

/// One decoded provider update record, borrowing its mask from the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderUpdate<'a> {
    pub provider_id: u32,
    pub enabled: bool,
    pub event_mask: &'a [u8],
}

impl<'a> ProviderUpdate<'a> {
    pub fn new(provider_id: u32, enabled: bool, event_mask: &'a [u8]) -> Self {
        Self {
            provider_id,
            enabled,
            event_mask,
        }
    }

    /// Length of this record on the wire.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        PROVIDER_UPDATE_HEADER_SIZE + self.event_mask.len()
    }

    /// Append this record to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u32(self.provider_id);
        buf.put_u8(u8::from(self.enabled));
        buf.put_bytes(0, 3);
        buf.put_u32(self.event_mask.len() as u32);
        buf.put_slice(self.event_mask);
    }

    /// Parse the record at the start of `buf`.
    ///
    /// Returns the record and its total length.
    ///
    /// # Errors
    ///
    /// Returns `MalformedUpdate` if fewer than `PROVIDER_UPDATE_HEADER_SIZE`
    /// bytes remain or the declared mask runs past the end of `buf`.
    pub fn parse(buf: &'a [u8]) -> Result<(Self, usize)> {
        if buf.len() < PROVIDER_UPDATE_HEADER_SIZE {
            return Err(TracewireError::MalformedUpdate(format!(
                "{} trailing bytes cannot hold a record header",
                buf.len()
            )));
        }

        let provider_id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let enabled = buf[4] != 0;
        let mask_size = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]) as usize;

        let record_len = PROVIDER_UPDATE_HEADER_SIZE
            .checked_add(mask_size)
            .filter(|len| *len <= buf.len())
            .ok_or_else(|| {
                TracewireError::MalformedUpdate(format!(
                    "record for provider {} declares {} mask bytes, {} available",
                    provider_id,
                    mask_size,
                    buf.len() - PROVIDER_UPDATE_HEADER_SIZE
                ))
            })?;

        let update = Self {
            provider_id,
            enabled,
            event_mask: &buf[PROVIDER_UPDATE_HEADER_SIZE..record_len],
        };
        Ok((update, record_len))
    }

    /// Whether this record enables event `event_id`.
    pub fn is_event_enabled(&self, event_id: u32) -> bool {
        mask_bit(self.event_mask, event_id)
    }
}

/// Test bit `event_id` of an event mask.
pub fn mask_bit(mask: &[u8], event_id: u32) -> bool {
    let byte = (event_id / 8) as usize;
    mask.get(byte)
        .is_some_and(|bits| bits & (1 << (event_id % 8)) != 0)
}

/// Result of walking an update block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Result reported to the peer.
    pub result: ResultCode,
    /// Records the registry accepted, in block order.
    pub records_applied: usize,
    /// Byte offset the walk stopped at.
    pub bytes_consumed: usize,
}

/// Apply every record in `block` to `registry`, in order.
///
/// Stops at the first record the registry rejects and reports its result.
/// Records applied before that one stay applied. A block that cannot be
/// walked exactly to its end is reported as `ResultCode::Error`.
pub fn apply_update_records(registry: &dyn ProviderRegistry, block: &[u8]) -> ApplyOutcome {
    let mut outcome = ApplyOutcome {
        result: ResultCode::Success,
        records_applied: 0,
        bytes_consumed: 0,
    };

    while outcome.bytes_consumed < block.len() && outcome.result.is_success() {
        let (update, record_len) = match ProviderUpdate::parse(&block[outcome.bytes_consumed..]) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::error!(
                    offset = outcome.bytes_consumed,
                    block_size = block.len(),
                    "Rejecting provider update block: {}",
                    e
                );
                outcome.result = ResultCode::Error;
                break;
            }
        };

        outcome.result = registry.apply_provider_update(&update);
        outcome.bytes_consumed += record_len;

        if outcome.result.is_success() {
            outcome.records_applied += 1;
        } else {
            tracing::debug!(
                provider_id = update.provider_id,
                result = %outcome.result,
                applied = outcome.records_applied,
                "Provider update rejected, stopping"
            );
        }
    }

    if outcome.result.is_success() && outcome.bytes_consumed != block.len() {
        tracing::error!(
            consumed = outcome.bytes_consumed,
            block_size = block.len(),
            "Provider update walk ended off the block boundary"
        );
        outcome.result = ResultCode::Error;
    }

    outcome
}

/// Build an update block from a list of records.
pub fn encode_update_block(updates: &[ProviderUpdate<'_>]) -> BytesMut {
    let len = updates.iter().map(ProviderUpdate::encoded_len).sum();
    let mut buf = BytesMut::with_capacity(len);
    for update in updates {
        update.encode_into(&mut buf);
    }
    buf
}
