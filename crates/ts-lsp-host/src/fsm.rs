use std::{collections::HashMap, sync::Arc};

use async_rwlock::RwLock as AsyncRwLock;
use ts_lsp_abstractions::tracing::info;

use crate::{
	config::ServerConfig,
	json_rpc::message::Message,
	lsp::{dispatch::Dispatch, request::RequestManager, state::LspServerState, LspProtocolError},
	lsp_impl::{self, state::State},
	tracing::TraceValueAccessor
};

/// A boxed [`Dispatch`] implementation that handles messages for exactly one [`LspServerState`].
pub(crate) type LspServerStateDispatcher = Box<dyn Dispatch<State> + Send + Sync + 'static>;

/// A state machine that models the Language Server Protocol (LSP). In the specification, a LSP server has a lifecycle
/// that is managed fully by the client. [`LspProtocolMachine`] ensures that the server responds accordingly by
/// transitioning itself through states based on the requests received, and then processed on behalf of the client. If
/// the server is in an invalid state for a given request, then the client will receive an appropriate error response.
pub(crate) struct LspProtocolMachine {
	/// The [`LspServerStateDispatcher`] registered for each [`LspServerState`].
	dispatchers: HashMap<LspServerState, LspServerStateDispatcher>,

	/// The shared, mutable server state accessible to all dispatchers.
	state: Arc<AsyncRwLock<State>>,

	/// The current [`LspServerState`].
	current_state: LspServerState
}

impl LspProtocolMachine {
	/// Initializes a new [`LspProtocolMachine`] that will start in the [`LspServerState::ActiveUninitialized`] state.
	pub fn new(request_manager: RequestManager, config: ServerConfig, trace_value: Option<TraceValueAccessor>) -> Self {
		let mut dispatchers: HashMap<LspServerState, LspServerStateDispatcher> = HashMap::new();

		dispatchers.insert(LspServerState::ActiveUninitialized, lsp_impl::active_uninitialized::create_dispatcher());
		dispatchers.insert(LspServerState::Initializing, lsp_impl::initializing::create_dispatcher());
		dispatchers.insert(LspServerState::ActiveInitialized, lsp_impl::active_initialized::create_dispatcher());
		dispatchers.insert(LspServerState::ShuttingDown, lsp_impl::shutting_down::create_dispatcher());
		dispatchers.insert(LspServerState::Stopped, lsp_impl::stopped::create_dispatcher());

		let mut state = State::new(request_manager, config);

		state.trace_value = trace_value;

		Self {
			dispatchers,
			state: Arc::new(AsyncRwLock::new(state)),
			current_state: LspServerState::ActiveUninitialized
		}
	}

	/// Returns `true` if the current [`LspProtocolMachine`] is in an active state; otherwise `false`.
	pub fn is_active(&self) -> bool {
		self.current_state != LspServerState::Stopped
	}

	/// Processes a [`Message`] for the current [`LspServerState`], and returns an optional [`Message`] that represents its response.
	pub async fn process_message(&mut self, message: &Message) -> Result<Option<Message>, LspProtocolError> {
		let dispatcher = self
			.dispatchers
			.get(&self.current_state)
			.expect("a dispatcher is registered for every LspServerState variant");

		let message = Arc::new(message.clone());

		let (response, next_state) = dispatcher.dispatch(message, self.state.clone()).await?;

		if next_state != self.current_state {
			info!("Transitioning from {:?} to {:?}.", self.current_state, next_state);

			self.current_state = next_state;
		}

		Ok(response)
	}
}
