use async_rwlock::RwLock as AsyncRwLock;
use std::sync::Arc;

use ts_lsp_abstractions::lsp_types::{
	notification::{Exit, Initialized},
	InitializedParams,
};

use crate::{
	fsm::LspServerStateDispatcher,
	json_rpc::ErrorCode,
	lsp::{dispatch::Dispatch, dispatch_target::HandlerResult, state::LspServerState, DispatchBuilder},
};

use super::state::State;

/// Builds and then returns a dispatcher handling the [`LspServerState::Initializing`] state.
pub(crate) fn create_dispatcher() -> LspServerStateDispatcher {
	Box::new(
		DispatchBuilder::<State>::new(LspServerState::Initializing)
			.for_notification_with_options::<Initialized, _>(on_client_initialized, |mut options| {
				options.transition_to(LspServerState::ActiveInitialized)
			})
			.for_unhandled_requests((ErrorCode::ServerNotInitialized, "The server is initializing."))
			.for_notification_with_options::<Exit, _>(on_exit, |mut options| {
				options.transition_to(LspServerState::Stopped)
			})
			.build(),
	)
}

/// Responds to an `'initialized'` notification from the LSP client. The analyzer process was
/// already launched during `initialize`; there is nothing further to register.
async fn on_client_initialized(_: LspServerState, _: InitializedParams, _: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	Ok(())
}

/// Responds to an 'exit' notification from the LSP client, terminating the analyzer subprocess if
/// one was started during `initialize`.
async fn on_exit(_: LspServerState, _: (), state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	super::stop_analyzer(&state).await;

	Ok(())
}
