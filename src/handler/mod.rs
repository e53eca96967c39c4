//! Handler module - request dispatch.
//!
//! Provides:
//! - [`dispatch`] - routes the request in a payload container by command code
//! - [`HandlerContext`] - registry, transfer manager and update block slot
//! - the three request handlers, usable on their own
//!
//! Handlers are plain functions over `(context, container)` returning the
//! next session state. They never fail: policy failures become result codes
//! in the response. Only a request the session cannot route is an error.

mod commands;
mod context;

pub use commands::{
    handle_allocate_provider_updates, handle_apply_provider_updates, handle_query_providers,
};
pub use context::HandlerContext;

use crate::error::{Result, TracewireError};
use crate::protocol::{EventCommand, PayloadContainer};
use crate::session::SessionState;

/// Run the handler for the request held in `container`.
///
/// # Errors
///
/// - `UnknownCommand` if the command code is not defined
/// - `UnexpectedCommand` if the code names a response or event message
///
/// The container is left untouched on error.
pub fn dispatch(
    ctx: &mut HandlerContext<'_>,
    container: &mut PayloadContainer,
) -> Result<SessionState> {
    let command = container.command()?;

    match command {
        EventCommand::QueryProvidersRequest => Ok(handle_query_providers(ctx, container)),
        EventCommand::AllocateProviderUpdatesRequest => {
            Ok(handle_allocate_provider_updates(ctx, container))
        }
        EventCommand::ApplyProviderUpdatesRequest => {
            Ok(handle_apply_provider_updates(ctx, container))
        }
        EventCommand::QueryProvidersResponse
        | EventCommand::AllocateProviderUpdatesResponse
        | EventCommand::ApplyProviderUpdatesResponse
        | EventCommand::EventDataUpdate => Err(TracewireError::UnexpectedCommand(command.code())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::protocol::{EventMessage, ResultCode};
    use crate::provider::{
        encode_update_block, EventDescriptor, ProviderDescriptor, ProviderRegistry,
        ProviderTable, ProviderUpdate,
    };
    use crate::transfer::{BlockId, BlockManager, ServerBlock, TransferManager};

    struct Fixture {
        transfer: Arc<BlockManager>,
        table: ProviderTable,
        update_block: Option<ServerBlock>,
    }

    impl Fixture {
        fn new(max_blocks: usize) -> Self {
            let transfer = Arc::new(BlockManager::with_max_blocks(max_blocks));
            let table = ProviderTable::new(transfer.clone());
            table
                .register(
                    ProviderDescriptor::new(1, "gpu").with_event(EventDescriptor::new(0, "draw")),
                )
                .unwrap();
            table
                .register(
                    ProviderDescriptor::new(2, "cpu").with_event(EventDescriptor::new(0, "tick")),
                )
                .unwrap();
            Self {
                transfer,
                table,
                update_block: None,
            }
        }

        fn run(&mut self, request: EventMessage) -> Result<(SessionState, EventMessage)> {
            let mut container = PayloadContainer::new();
            container.create(&request);
            let mut ctx = HandlerContext::new(
                1,
                &self.table,
                self.transfer.as_ref(),
                &mut self.update_block,
            );
            let state = dispatch(&mut ctx, &mut container)?;
            Ok((state, container.decode()?))
        }
    }

    #[test]
    fn test_query_returns_discovery_block() {
        let mut fixture = Fixture::new(4);
        let (state, response) = fixture.run(EventMessage::QueryProvidersRequest).unwrap();

        assert_eq!(state, SessionState::SendPayload);
        match response {
            EventMessage::QueryProvidersResponse { result, block_id } => {
                assert_eq!(result, ResultCode::Success);
                assert!(fixture.transfer.get_block(block_id).is_some());
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_query_failure_reports_invalid_block() {
        let mut fixture = Fixture::new(0);
        let (_, response) = fixture.run(EventMessage::QueryProvidersRequest).unwrap();

        assert_eq!(
            response,
            EventMessage::QueryProvidersResponse {
                result: ResultCode::InsufficientMemory,
                block_id: BlockId::INVALID,
            }
        );
    }

    #[test]
    fn test_allocate_failure_reports_error() {
        let mut fixture = Fixture::new(0);
        let (state, response) = fixture
            .run(EventMessage::AllocateProviderUpdatesRequest)
            .unwrap();

        assert_eq!(state, SessionState::SendPayload);
        assert_eq!(
            response,
            EventMessage::AllocateProviderUpdatesResponse {
                result: ResultCode::Error,
                block_id: BlockId::INVALID,
            }
        );
        assert!(fixture.update_block.is_none());
    }

    #[test]
    fn test_second_allocate_fails_and_keeps_block() {
        let mut fixture = Fixture::new(4);

        let (_, first) = fixture
            .run(EventMessage::AllocateProviderUpdatesRequest)
            .unwrap();
        let EventMessage::AllocateProviderUpdatesResponse { result, block_id } = first else {
            panic!("unexpected response {:?}", first);
        };
        assert_eq!(result, ResultCode::Success);
        assert!(block_id.is_valid());

        let (_, second) = fixture
            .run(EventMessage::AllocateProviderUpdatesRequest)
            .unwrap();
        assert_eq!(
            second,
            EventMessage::AllocateProviderUpdatesResponse {
                result: ResultCode::Error,
                block_id: BlockId::INVALID,
            }
        );
        assert_eq!(fixture.update_block.as_ref().map(|b| b.id()), Some(block_id));
        assert_eq!(fixture.transfer.open_count(), 1);
    }

    #[test]
    fn test_apply_without_block() {
        let mut fixture = Fixture::new(4);
        let (_, response) = fixture
            .run(EventMessage::ApplyProviderUpdatesRequest)
            .unwrap();

        assert_eq!(
            response,
            EventMessage::ApplyProviderUpdatesResponse {
                result: ResultCode::Error
            }
        );
    }

    #[test]
    fn test_apply_written_block() {
        let mut fixture = Fixture::new(4);
        fixture
            .run(EventMessage::AllocateProviderUpdatesRequest)
            .unwrap();

        let block = fixture.update_block.clone().unwrap();
        block.write(&encode_update_block(&[
            ProviderUpdate::new(1, true, &[1]),
            ProviderUpdate::new(2, true, &[1]),
        ]));

        let (_, response) = fixture
            .run(EventMessage::ApplyProviderUpdatesRequest)
            .unwrap();

        assert_eq!(
            response,
            EventMessage::ApplyProviderUpdatesResponse {
                result: ResultCode::Success
            }
        );
        assert!(fixture.table.is_event_enabled(1, 0));
        assert!(fixture.table.is_event_enabled(2, 0));
        assert!(fixture.update_block.is_some());
    }

    #[test]
    fn test_response_code_as_request_is_rejected() {
        let mut fixture = Fixture::new(4);
        let result = fixture.run(EventMessage::ApplyProviderUpdatesResponse {
            result: ResultCode::Success,
        });

        assert!(matches!(result, Err(TracewireError::UnexpectedCommand(6))));
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let mut fixture = Fixture::new(4);
        let mut container = PayloadContainer::new();
        container.fill_from(&[42, 0, 0, 0]).unwrap();
        let mut ctx = HandlerContext::new(
            1,
            &fixture.table,
            fixture.transfer.as_ref(),
            &mut fixture.update_block,
        );

        let result = dispatch(&mut ctx, &mut container);

        assert!(matches!(result, Err(TracewireError::UnknownCommand(42))));
        assert_eq!(container.as_bytes(), &[42, 0, 0, 0]);
    }
}
