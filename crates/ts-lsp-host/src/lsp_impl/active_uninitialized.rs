use async_rwlock::RwLock as AsyncRwLock;
use std::sync::Arc;

use ts_lsp_abstractions::{
	lsp_types::{
		notification::Exit, request::Initialize, CodeActionProviderCapability, CompletionOptions, DocumentSymbolOptions,
		ExecuteCommandOptions, FoldingRangeProviderCapability, HoverProviderCapability, ImplementationProviderCapability,
		InitializeParams, InitializeResult, OneOf, OneOf::Left, RenameOptions, ServerCapabilities, ServerInfo,
		SignatureHelpOptions, TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
		TypeDefinitionProviderCapability, WorkDoneProgressOptions, WorkspaceSymbolOptions,
	},
	tracing::{info, warn},
};

use crate::{
	analyzer::{
		client::{AnalyzerClient, AnalyzerEvent},
		discovery::discover_analyzer_path,
	},
	fsm::LspServerStateDispatcher,
	json_rpc::ErrorCode,
	lsp::{dispatch::Dispatch, dispatch_target::HandlerResult, state::LspServerState, DispatchBuilder},
	translation,
};

use super::{state::State, EXECUTE_COMMANDS};

/// Builds and then returns a dispatcher handling the [`LspServerState::ActiveUninitialized`] state.
pub(crate) fn create_dispatcher() -> LspServerStateDispatcher {
	Box::new(
		DispatchBuilder::<State>::new(LspServerState::ActiveUninitialized)
			.for_request_with_options::<Initialize, _>(on_initialize, |mut options| {
				options.transition_to(LspServerState::Initializing)
			})
			.for_unhandled_requests((ErrorCode::ServerNotInitialized, "An 'initialize' request is required."))
			.for_notification_with_options::<Exit, _>(on_exit, |mut options| {
				options.transition_to(LspServerState::Stopped)
			})
			.build(),
	)
}

/// Responds to an 'initialize' request by discovering and launching the analyzer (§6) and
/// returning the server's advertised capabilities.
async fn on_initialize(
	_: LspServerState,
	params: InitializeParams,
	state: Arc<AsyncRwLock<State>>,
) -> HandlerResult<InitializeResult> {
	let workspace_root = params
		.root_uri
		.as_ref()
		.and_then(|uri| translation::uri_to_path(uri.as_str()))
		.or_else(|| {
			params
				.workspace_folders
				.as_ref()
				.and_then(|folders| folders.first())
				.and_then(|folder| translation::uri_to_path(folder.uri.as_str()))
		});

	let (request_manager, config, trace) = {
		let state = state.read().await;

		(state.request_manager.clone(), state.config.clone(), params.trace)
	};

	if let Some(trace_value) = trace {
		state.read().await.set_trace_value(trace_value);
	}

	let tsserver_path = discover_analyzer_path(config.tsserver_path.as_deref(), workspace_root.as_deref());

	let analyzer = match tsserver_path {
		Some(tsserver_path) => {
			let (events_tx, events_rx) = async_channel::unbounded();

			match AnalyzerClient::start(
				&tsserver_path,
				config.tsserver_log_file.as_deref(),
				config.tsserver_log_verbosity.as_deref(),
				events_tx,
			)
			.await
			{
				Ok(client) => {
					let client = Arc::new(client);

					let diagnostics = state.read().await.diagnostics.clone();
					let event_request_manager = request_manager.clone();

					tokio::spawn(async move {
						while let Ok(event) = events_rx.recv().await {
							match event {
								AnalyzerEvent::Diagnostic { kind, file, diagnostics: items } => {
									diagnostics.handle_event(&event_request_manager, &file, kind, items).await;
								}
								AnalyzerEvent::Other { name, .. } => {
									info!(event = %name, "analyzer event");
								}
							}
						}
					});

					// Fire-and-forget: there is no meaningful response to block `initialize` on.
					let configure_client = client.clone();

					tokio::spawn(async move {
						let _ = configure_client
							.notify("configure", Some(serde_json::json!({ "hostInfo": "ts-lsp" })))
							.await;
					});

					Some(client)
				}
				Err(err) => {
					warn!("failed to start the analyzer process: {}", err);

					None
				}
			}
		}
		None => {
			warn!("no analyzer executable could be discovered; diagnostics and editor operations will be unavailable");

			None
		}
	};

	{
		let mut state = state.write().await;

		*state.workspace_root.write().await = workspace_root;
		state.analyzer = analyzer;
	}

	Ok(create_initialize_result())
}

/// Responds to an 'exit' notification from the LSP client.
async fn on_exit(_: LspServerState, _: (), state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	super::stop_analyzer(&state).await;

	Ok(())
}

/// Creates the [`InitializeResult`] describing the server's capabilities (§6).
fn create_initialize_result() -> InitializeResult {
	InitializeResult {
		capabilities: ServerCapabilities {
			text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
				open_close: Some(true),
				change: Some(TextDocumentSyncKind::INCREMENTAL),
				..Default::default()
			})),
			completion_provider: Some(CompletionOptions {
				resolve_provider: Some(true),
				trigger_characters: Some(
					[".", "\"", "'", "/", "@", "<"].iter().map(|c| c.to_string()).collect(),
				),
				all_commit_characters: None,
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			}),
			hover_provider: Some(HoverProviderCapability::Simple(true)),
			signature_help_provider: Some(SignatureHelpOptions {
				trigger_characters: Some(["(", ",", "<"].iter().map(|c| c.to_string()).collect()),
				retrigger_characters: None,
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			}),
			definition_provider: Some(Left(true)),
			type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
			implementation_provider: Some(ImplementationProviderCapability::Simple(true)),
			references_provider: Some(Left(true)),
			document_highlight_provider: Some(Left(true)),
			document_symbol_provider: Some(OneOf::Right(DocumentSymbolOptions {
				label: None,
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			})),
			workspace_symbol_provider: Some(OneOf::Right(WorkspaceSymbolOptions {
				resolve_provider: None,
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			})),
			document_formatting_provider: Some(Left(true)),
			rename_provider: Some(OneOf::Right(RenameOptions {
				// No `textDocument/prepareRename` handler is registered; don't advertise it.
				prepare_provider: Some(false),
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			})),
			code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
			folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
			execute_command_provider: Some(ExecuteCommandOptions {
				commands: EXECUTE_COMMANDS.iter().map(|c| c.to_string()).collect(),
				work_done_progress_options: WorkDoneProgressOptions { work_done_progress: None },
			}),
			..Default::default()
		},
		server_info: Some(ServerInfo { name: String::from("ts-lsp"), version: Some(String::from(env!("CARGO_PKG_VERSION"))) }),
	}
}
