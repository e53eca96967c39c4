//! The three request handlers.
//!
//! Each one overwrites the request in `container` with exactly one response
//! and moves the session on to sending it.

use super::HandlerContext;
use crate::protocol::{EventMessage, PayloadContainer, ResultCode};
use crate::provider::apply_update_records;
use crate::session::SessionState;
use crate::transfer::BlockId;

/// Ask the registry to publish its providers in a discovery block.
pub fn handle_query_providers(
    ctx: &mut HandlerContext<'_>,
    container: &mut PayloadContainer,
) -> SessionState {
    let (result, block_id) = match ctx.registry.build_query_providers_response() {
        Ok(block_id) => (ResultCode::Success, block_id),
        Err(result) => (result, BlockId::INVALID),
    };

    tracing::debug!(
        session_id = ctx.session_id,
        %result,
        %block_id,
        "QueryProviders"
    );
    container.create(&EventMessage::QueryProvidersResponse { result, block_id });
    SessionState::SendPayload
}

/// Open the block the client writes its provider updates into.
///
/// A session holds one update block at most; asking again while it is open
/// fails without touching the open block.
pub fn handle_allocate_provider_updates(
    ctx: &mut HandlerContext<'_>,
    container: &mut PayloadContainer,
) -> SessionState {
    let (result, block_id) = if ctx.has_update_block() {
        tracing::warn!(
            session_id = ctx.session_id,
            "Provider update block already allocated"
        );
        (ResultCode::Error, BlockId::INVALID)
    } else {
        match ctx.transfer.open_server_block() {
            Some(block) => {
                let block_id = block.id();
                *ctx.update_block = Some(block);
                (ResultCode::Success, block_id)
            }
            None => {
                tracing::warn!(
                    session_id = ctx.session_id,
                    "No transfer block available for provider updates"
                );
                (ResultCode::Error, BlockId::INVALID)
            }
        }
    };

    tracing::debug!(
        session_id = ctx.session_id,
        %result,
        %block_id,
        "AllocateProviderUpdates"
    );
    container.create(&EventMessage::AllocateProviderUpdatesResponse { result, block_id });
    SessionState::SendPayload
}

/// Apply the records the client wrote into the update block.
///
/// The block stays open afterwards; it is closed with the session.
pub fn handle_apply_provider_updates(
    ctx: &mut HandlerContext<'_>,
    container: &mut PayloadContainer,
) -> SessionState {
    let result = match ctx.update_block.as_ref() {
        Some(block) => {
            let data = block.snapshot();
            let outcome = apply_update_records(ctx.registry, &data);
            tracing::debug!(
                session_id = ctx.session_id,
                block_id = %block.id(),
                records = outcome.records_applied,
                consumed = outcome.bytes_consumed,
                result = %outcome.result,
                "ApplyProviderUpdates"
            );
            outcome.result
        }
        None => {
            tracing::warn!(
                session_id = ctx.session_id,
                "ApplyProviderUpdates without an allocated block"
            );
            ResultCode::Error
        }
    };

    container.create(&EventMessage::ApplyProviderUpdatesResponse { result });
    SessionState::SendPayload
}
