use async_rwlock::RwLock as AsyncRwLock;
use cancellation::CancellationTokenSource;
use std::{
	future::Future,
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};

use ts_lsp_abstractions::{
	lsp_types::{
		notification::{DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument, Exit, SetTrace},
		request::{
			ApplyWorkspaceEdit, CodeActionRequest, Completion, DocumentHighlightRequest, DocumentSymbolRequest,
			ExecuteCommand, Formatting, FoldingRangeRequest, GotoDefinition, GotoImplementation, GotoTypeDefinition,
			HoverRequest, References, Rename, ResolveCompletionItem, Shutdown, SignatureHelpRequest,
			WorkspaceSymbolRequest,
		},
		ApplyWorkspaceEditParams, CodeAction, CodeActionOrCommand, CodeActionParams, CodeActionResponse, Command,
		CompletionItem, CompletionList, CompletionParams, CompletionResponse, Diagnostic, DidChangeTextDocumentParams,
		DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentFormattingParams, DocumentHighlight,
		DocumentHighlightKind, DocumentHighlightParams, DocumentSymbolParams, DocumentSymbolResponse,
		ExecuteCommandParams, FoldingRange, FoldingRangeKind, FoldingRangeParams, GotoDefinitionParams,
		GotoDefinitionResponse, Hover, HoverContents, HoverParams, Location, NumberOrString, ParameterInformation,
		ReferenceParams, RenameParams, SetTraceParams, SignatureHelp, SignatureInformation, SymbolInformation, Url,
		WorkspaceEdit, WorkspaceSymbolParams,
	},
	tracing::{error, warn},
};

use crate::{
	analyzer::{
		client::AnalyzerClient,
		protocol::{
			ApplicableRefactorInfo, CodeFixAction, DefinitionEntry, FileCodeEdits, NavigationTree, NavtoItem,
			OutliningSpan, QuickInfoResponse, ReferencesResponse, RefactorEditInfo, RenameResponse, SignatureHelpItems,
		},
	},
	document::{Document, Language},
	fsm::LspServerStateDispatcher,
	json_rpc::ErrorCode,
	lsp::{
		dispatch::Dispatch,
		dispatch_target::{HandlerError, HandlerResult},
		state::LspServerState,
		DispatchBuilder,
	},
	translation,
};

use super::state::State;

/// Builds and then returns a dispatcher handling the [`LspServerState::ActiveInitialized`] state.
pub(crate) fn create_dispatcher() -> LspServerStateDispatcher {
	Box::new(
		DispatchBuilder::<State>::new(LspServerState::ActiveInitialized)
			.for_request_with_options::<Shutdown, _>(on_shutdown, |mut options| {
				options.transition_to(LspServerState::ShuttingDown)
			})
			.for_notification::<DidOpenTextDocument, _>(on_did_open)
			.for_notification::<DidChangeTextDocument, _>(on_did_change)
			.for_notification::<DidCloseTextDocument, _>(on_did_close)
			.for_notification::<SetTrace, _>(on_set_trace)
			.for_request::<HoverRequest, _>(on_hover)
			.for_request::<Completion, _>(on_completion)
			.for_request::<ResolveCompletionItem, _>(on_completion_resolve)
			.for_request::<GotoDefinition, _>(on_definition)
			.for_request::<GotoImplementation, _>(on_implementation)
			.for_request::<GotoTypeDefinition, _>(on_type_definition)
			.for_request::<References, _>(on_references)
			.for_request::<DocumentHighlightRequest, _>(on_document_highlight)
			.for_request::<DocumentSymbolRequest, _>(on_document_symbol)
			.for_request::<WorkspaceSymbolRequest, _>(on_workspace_symbol)
			.for_request::<SignatureHelpRequest, _>(on_signature_help)
			.for_request::<Rename, _>(on_rename)
			.for_request::<Formatting, _>(on_formatting)
			.for_request::<FoldingRangeRequest, _>(on_folding_range)
			.for_request::<CodeActionRequest, _>(on_code_action)
			.for_request::<ExecuteCommand, _>(on_execute_command)
			.for_notification_with_options::<Exit, _>(on_exit, |mut options| {
				options.transition_to(LspServerState::Stopped)
			})
			.build(),
	)
}

fn now_ms() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Runs `f`, interrupting any in-flight diagnostics round first and re-issuing one afterwards
/// (§4.5, §5). Used for the latency-sensitive interactive queries.
async fn interrupt_diagnostics<F, Fut, T>(state: &Arc<AsyncRwLock<State>>, f: F) -> T
where
	F: FnOnce() -> Fut,
	Fut: Future<Output = T>,
{
	let in_flight = state.read().await.diagnostics_token.write().await.take();

	if let Some(source) = in_flight {
		source.cancel();
	}

	let result = f().await;

	request_diagnostics(state).await;

	result
}

/// Installs a fresh diagnostics token and requests `geterr` for the open files, least-recently-used
/// first (§4.5).
async fn request_diagnostics(state: &Arc<AsyncRwLock<State>>) {
	let (analyzer, documents_lock) = {
		let state = state.read().await;

		(state.analyzer.clone(), state.documents.clone())
	};

	let Some(analyzer) = analyzer else { return };

	let files: Vec<String> = {
		let guard = documents_lock.read().await;
		let mut documents: Vec<&Document> = guard.values().collect();

		documents.sort_by_key(|document| document.last_accessed());

		documents.iter().filter_map(|document| translation::uri_to_path(document.uri())).map(|path| path.to_string_lossy().into_owned()).collect()
	};

	if files.is_empty() {
		return;
	}

	let source = CancellationTokenSource::new();
	let cancel_token = source.token().clone();
	let identity = cancel_token.clone();

	let diagnostics_token = {
		let state = state.read().await;

		*state.diagnostics_token.write().await = Some(source);

		state.diagnostics_token.clone()
	};

	tokio::spawn(async move {
		let _ = analyzer.request("geterr", Some(serde_json::json!({ "files": files, "delay": 0 })), Some(cancel_token)).await;

		let mut slot = diagnostics_token.write().await;

		if let Some(current) = slot.as_ref() {
			if Arc::ptr_eq(current.token(), &identity) {
				*slot = None;
			}
		}
	});
}

async fn on_shutdown(_: LspServerState, _: (), _: Arc<AsyncRwLock<State>>) -> HandlerResult<()> { Ok(()) }

/// Responds to an 'exit' notification from the LSP client.
async fn on_exit(_: LspServerState, _: (), state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	super::stop_analyzer(&state).await;

	Ok(())
}

async fn on_set_trace(_: LspServerState, params: SetTraceParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	state.read().await.set_trace_value(params.value);

	Ok(())
}

/// Idempotent open (§4.5, §9): a repeated open for an already-tracked URI is reinterpreted as a
/// full-text change rather than rejected.
async fn on_did_open(_: LspServerState, params: DidOpenTextDocumentParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	let uri = params.text_document.uri.to_string();
	let already_open = state.read().await.documents.clone().read().await.contains_key(&uri);

	if already_open {
		let mut document = state.read().await.documents.clone().write().await.get(&uri).cloned();

		if let Some(document) = document.as_mut() {
			document.apply_change(None, &params.text_document.text, params.text_document.version);

			state.read().await.documents.clone().write().await.insert(uri.clone(), document.clone());
		}

		send_change(&state, &uri, &params.text_document.text).await;
		request_diagnostics(&state).await;

		return Ok(());
	}

	let language = Language::from_language_id(&params.text_document.language_id);
	let document = Document::create(uri.clone(), language, params.text_document.version, &params.text_document.text, now_ms());

	state.read().await.documents.clone().write().await.insert(uri.clone(), document);

	let (analyzer, workspace_root) = {
		let state = state.read().await;

		(state.analyzer.clone(), state.workspace_root.read().await.clone())
	};

	if let (Some(analyzer), Some(path)) = (analyzer, translation::uri_to_path(&uri)) {
		let mut arguments = serde_json::json!({
			"file": path.to_string_lossy(),
			"fileContent": params.text_document.text,
		});

		if let Some(kind) = language.script_kind() {
			arguments["scriptKindName"] = serde_json::Value::String(kind.into());
		}

		if let Some(root) = workspace_root {
			arguments["projectRootPath"] = serde_json::Value::String(root.to_string_lossy().into_owned());
		}

		let _ = analyzer.notify("open", Some(arguments)).await;
	}

	request_diagnostics(&state).await;

	Ok(())
}

async fn send_change(state: &Arc<AsyncRwLock<State>>, uri: &str, full_text: &str) {
	let analyzer = state.read().await.analyzer.clone();
	let Some(analyzer) = analyzer else { return };
	let Some(path) = translation::uri_to_path(uri) else { return };

	let arguments = serde_json::json!({
		"file": path.to_string_lossy(),
		"line": 1,
		"offset": 1,
		"endLine": i32::MAX,
		"endOffset": i32::MAX,
		"insertString": full_text,
	});

	let _ = analyzer.notify("change", Some(arguments)).await;
}

async fn on_did_change(_: LspServerState, params: DidChangeTextDocumentParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	let uri = params.text_document.uri.to_string();
	let documents = state.read().await.documents.clone();

	let Some(mut document) = documents.read().await.get(&uri).cloned() else {
		return Err(HandlerError::new("received a didChange notification for an unknown document"));
	};

	let analyzer = state.read().await.analyzer.clone();
	let Some(path) = translation::uri_to_path(&uri) else { return Ok(()) };

	for change in params.content_changes {
		match change.range {
			Some(range) => {
				let analyzer_range = translation::range_to_analyzer(range);

				document.apply_change(Some(range), &change.text, params.text_document.version);

				if let Some(analyzer) = &analyzer {
					let arguments = serde_json::json!({
						"file": path.to_string_lossy(),
						"line": analyzer_range.start.line,
						"offset": analyzer_range.start.offset,
						"endLine": analyzer_range.end.line,
						"endOffset": analyzer_range.end.offset,
						"insertString": change.text,
					});

					let _ = analyzer.notify("change", Some(arguments)).await;
				}
			}
			None => {
				document.apply_change(None, &change.text, params.text_document.version);

				if analyzer.is_some() {
					send_change(&state, &uri, &change.text).await;
				}
			}
		}
	}

	document.mark_accessed(now_ms());
	documents.write().await.insert(uri, document);

	request_diagnostics(&state).await;

	Ok(())
}

async fn on_did_close(_: LspServerState, params: DidCloseTextDocumentParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<()> {
	let uri = params.text_document.uri.to_string();

	let (analyzer, documents, request_manager, diagnostics) = {
		let state = state.read().await;

		(state.analyzer.clone(), state.documents.clone(), state.request_manager.clone(), state.diagnostics.clone())
	};

	documents.write().await.remove(&uri);

	if let (Some(analyzer), Some(path)) = (analyzer, translation::uri_to_path(&uri)) {
		let _ = analyzer.notify("close", Some(serde_json::json!({ "file": path.to_string_lossy() }))).await;
	}

	diagnostics.clear(&request_manager, &uri).await;

	Ok(())
}

fn uri_and_position(uri: &Url, position: ts_lsp_abstractions::lsp_types::Position) -> Option<(std::path::PathBuf, serde_json::Value)> {
	let path = translation::uri_to_path(uri.as_str())?;
	let analyzer_position = translation::position_to_analyzer(position);

	Some((path.clone(), serde_json::json!({ "file": path.to_string_lossy(), "line": analyzer_position.line, "offset": analyzer_position.offset })))
}

async fn analyzer_of(state: &Arc<AsyncRwLock<State>>) -> Option<Arc<AnalyzerClient>> { state.read().await.analyzer.clone() }

async fn on_hover(_: LspServerState, params: HoverParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Hover>> {
	let uri = params.text_document_position_params.text_document.uri.clone();
	let position = params.text_document_position_params.position;

	let Some((_, arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let body = interrupt_diagnostics(&state, || async move { analyzer.request("quickinfo", Some(arguments), None).await }).await;

	match body {
		Ok(body) => match serde_json::from_value::<QuickInfoResponse>(body) {
			Ok(info) => {
				let markup = translation::render_hover_markdown(&info.display_string, &info.documentation, &info.tags);

				Ok(Some(Hover {
					contents: HoverContents::Markup(markup),
					range: Some(translation::range_from_analyzer(&crate::analyzer::protocol::AnalyzerRange {
						start: info.start,
						end: info.end,
					})),
				}))
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("hover request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_completion(_: LspServerState, params: CompletionParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<CompletionResponse>> {
	let uri = params.text_document_position.text_document.uri.clone();
	let position = params.text_document_position.position;

	let Some((_, arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let body = interrupt_diagnostics(&state, || async move { analyzer.request("completions", Some(arguments), None).await }).await;

	match body {
		Ok(body) => match serde_json::from_value::<Vec<crate::analyzer::protocol::CompletionEntry>>(body) {
			Ok(entries) => {
				let items = entries.iter().map(|entry| translation::completion_item_from_analyzer(entry, uri.as_str(), position)).collect();

				Ok(Some(CompletionResponse::List(CompletionList { is_incomplete: false, items })))
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("completion request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_completion_resolve(_: LspServerState, item: CompletionItem, state: Arc<AsyncRwLock<State>>) -> HandlerResult<CompletionItem> {
	let Some(data) = item.data.clone().and_then(|data| serde_json::from_value::<translation::CompletionItemData>(data).ok()) else {
		return Ok(item);
	};

	let Some(analyzer) = analyzer_of(&state).await else { return Ok(item) };
	let Some(path) = translation::uri_to_path(&data.uri) else { return Ok(item) };

	let arguments = serde_json::json!({
		"file": path.to_string_lossy(),
		"line": data.line,
		"offset": data.offset,
		"entryNames": [data.entry_name],
	});

	let body = interrupt_diagnostics(&state, || async move { analyzer.request("completionEntryDetails", Some(arguments), None).await }).await;

	let Ok(body) = body else { return Ok(item) };
	let Ok(mut details) = serde_json::from_value::<Vec<crate::analyzer::protocol::CompletionEntryDetails>>(body) else { return Ok(item) };

	let Some(detail) = details.pop() else { return Ok(item) };

	let mut resolved = item;
	let display = detail.display_parts.iter().map(|part| part.text.as_str()).collect::<Vec<_>>().join("");
	let documentation = detail.documentation.iter().map(|part| part.text.as_str()).collect::<Vec<_>>().join("");

	resolved.detail = Some(display);
	resolved.documentation =
		(!documentation.is_empty()).then(|| ts_lsp_abstractions::lsp_types::Documentation::String(documentation));

	if !detail.code_actions.is_empty() {
		let current_file = path.to_string_lossy();

		resolved.additional_text_edits = Some(
			detail
				.code_actions
				.iter()
				.flat_map(|action| &action.changes)
				.filter(|edit| edit.file_name == current_file)
				.flat_map(|edit| translation::text_edits_from_analyzer_changes(&edit.text_changes))
				.collect(),
		);

		resolved.command = Some(Command {
			title: "Apply completion action".into(),
			command: "_typescript.applyCompletionCodeAction".into(),
			arguments: serde_json::to_value(&detail.code_actions).ok().map(|value| vec![value]),
		});
	}

	Ok(resolved)
}

async fn goto(state: &Arc<AsyncRwLock<State>>, command: &str, uri: &Url, position: ts_lsp_abstractions::lsp_types::Position) -> HandlerResult<Option<GotoDefinitionResponse>> {
	let Some((_, arguments)) = uri_and_position(uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(state).await else { return Ok(None) };

	match analyzer.request(command, Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<Vec<DefinitionEntry>>(body) {
			Ok(entries) => {
				let locations: Vec<Location> = entries.iter().map(translation::location_from_definition_entry).collect();

				Ok(match locations.len() {
					0 => None,
					1 => Some(GotoDefinitionResponse::Scalar(locations.into_iter().next().unwrap())),
					_ => Some(GotoDefinitionResponse::Array(locations)),
				})
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!(command = command, "goto request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_definition(_: LspServerState, params: GotoDefinitionParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<GotoDefinitionResponse>> {
	goto(&state, "definition", &params.text_document_position_params.text_document.uri, params.text_document_position_params.position).await
}

async fn on_implementation(_: LspServerState, params: GotoDefinitionParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<GotoDefinitionResponse>> {
	goto(&state, "implementation", &params.text_document_position_params.text_document.uri, params.text_document_position_params.position).await
}

async fn on_type_definition(_: LspServerState, params: GotoDefinitionParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<GotoDefinitionResponse>> {
	goto(&state, "typeDefinition", &params.text_document_position_params.text_document.uri, params.text_document_position_params.position).await
}

async fn on_references(_: LspServerState, params: ReferenceParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Vec<Location>>> {
	let uri = params.text_document_position.text_document.uri.clone();
	let position = params.text_document_position.position;

	let Some((_, arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	match analyzer.request("references", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<ReferencesResponse>(body) {
			Ok(response) => Ok(Some(
				response
					.refs
					.iter()
					.map(|reference| translation::location_from_definition_entry(&DefinitionEntry { file: reference.file.clone(), start: reference.start, end: reference.end }))
					.collect(),
			)),
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("references request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_document_highlight(_: LspServerState, params: DocumentHighlightParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Vec<DocumentHighlight>>> {
	let uri = params.text_document_position_params.text_document.uri.clone();
	let position = params.text_document_position_params.position;

	let Some((path, mut arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	arguments["filesToSearch"] = serde_json::json!([path.to_string_lossy()]);

	let body = interrupt_diagnostics(&state, || async move { analyzer.request("occurrences", Some(arguments), None).await }).await;

	match body {
		Ok(body) => match serde_json::from_value::<Vec<crate::analyzer::protocol::ReferenceEntry>>(body) {
			Ok(entries) => Ok(Some(
				entries
					.into_iter()
					.map(|entry| DocumentHighlight {
						range: translation::range_from_analyzer(&crate::analyzer::protocol::AnalyzerRange { start: entry.start, end: entry.end }),
						kind: Some(if entry.is_write_access { DocumentHighlightKind::WRITE } else { DocumentHighlightKind::READ }),
					})
					.collect(),
			)),
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("document highlight request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_document_symbol(_: LspServerState, params: DocumentSymbolParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<DocumentSymbolResponse>> {
	let uri = params.text_document.uri.clone();
	let Some(path) = translation::uri_to_path(uri.as_str()) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let arguments = serde_json::json!({ "file": path.to_string_lossy() });

	match analyzer.request("navtree", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<NavigationTree>(body) {
			Ok(tree) => {
				let mut symbols: Vec<SymbolInformation> = Vec::new();

				translation::flatten_navigation_tree(&tree, &uri, None, &mut symbols);

				Ok(Some(DocumentSymbolResponse::Flat(symbols)))
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("document symbol request failed: {}", err);

			Ok(None)
		}
	}
}

/// Workspace-symbol search (§9): a "context file" is required by the analyzer; any open file is
/// used as a best-effort fallback, then the workspace root. No open file and no known root yields
/// an empty list rather than an error.
async fn on_workspace_symbol(_: LspServerState, params: WorkspaceSymbolParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Vec<SymbolInformation>>> {
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(Some(Vec::new())) };

	let context_file = {
		let state = state.read().await;
		let documents = state.documents.read().await;

		if let Some(document) = documents.values().next() {
			translation::uri_to_path(document.uri())
		}
		else {
			state.workspace_root.read().await.clone()
		}
	};

	let Some(context_file) = context_file else { return Ok(Some(Vec::new())) };

	let arguments = serde_json::json!({ "file": context_file.to_string_lossy(), "searchValue": params.query, "maxResultCount": 250 });

	match analyzer.request("navto", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<Vec<NavtoItem>>(body) {
			Ok(items) => Ok(Some(items.iter().map(translation::symbol_information_from_navto).collect())),
			Err(_) => Ok(Some(Vec::new())),
		},
		Err(err) => {
			warn!("workspace symbol request failed: {}", err);

			Ok(Some(Vec::new()))
		}
	}
}

async fn on_signature_help(_: LspServerState, params: ts_lsp_abstractions::lsp_types::SignatureHelpParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<SignatureHelp>> {
	let uri = params.text_document_position_params.text_document.uri.clone();
	let position = params.text_document_position_params.position;

	let Some((_, arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let body = interrupt_diagnostics(&state, || async move { analyzer.request("signatureHelp", Some(arguments), None).await }).await;

	match body {
		Ok(body) => match serde_json::from_value::<SignatureHelpItems>(body) {
			Ok(items) => {
				let signatures = items
					.items
					.iter()
					.map(|item| {
						let prefix = item.prefix_display_parts.iter().map(|p| p.text.as_str()).collect::<String>();
						let suffix = item.suffix_display_parts.iter().map(|p| p.text.as_str()).collect::<String>();
						let params_label = item.parameters.iter().map(|p| p.display_parts.iter().map(|d| d.text.as_str()).collect::<String>()).collect::<Vec<_>>().join(", ");
						let documentation = item.documentation.iter().map(|p| p.text.as_str()).collect::<String>();

						SignatureInformation {
							label: format!("{}{}{}", prefix, params_label, suffix),
							documentation: (!documentation.is_empty()).then(|| ts_lsp_abstractions::lsp_types::Documentation::String(documentation)),
							parameters: Some(
								item
									.parameters
									.iter()
									.map(|p| ParameterInformation {
										label: ts_lsp_abstractions::lsp_types::ParameterLabel::Simple(p.display_parts.iter().map(|d| d.text.as_str()).collect::<String>()),
										documentation: None,
									})
									.collect(),
							),
							active_parameter: None,
						}
					})
					.collect();

				Ok(Some(SignatureHelp {
					signatures,
					active_signature: Some(items.selected_item_index),
					active_parameter: Some(items.argument_index),
				}))
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("signature help request failed: {}", err);

			Ok(None)
		}
	}
}

async fn on_rename(_: LspServerState, params: RenameParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<WorkspaceEdit>> {
	let uri = params.text_document_position.text_document.uri.clone();
	let position = params.text_document_position.position;

	let Some((_, mut arguments)) = uri_and_position(&uri, position) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	arguments["findInStrings"] = serde_json::Value::Bool(false);
	arguments["findInComments"] = serde_json::Value::Bool(false);

	match analyzer.request("rename", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<RenameResponse>(body) {
			Ok(response) => {
				if !response.info.can_rename || response.locs.is_empty() {
					return Ok(None);
				}

				let mut edits = Vec::new();

				for file in &response.locs {
					for location in &file.locs {
						edits.push(FileCodeEdits {
							file_name: file.file.clone(),
							text_changes: vec![crate::analyzer::protocol::AnalyzerTextChange { start: location.start, end: location.end, new_text: params.new_name.clone() }],
						});
					}
				}

				Ok(Some(translation::workspace_edit_from_file_edits(&edits)))
			}
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("rename request failed: {}", err);

			Ok(None)
		}
	}
}

/// Formatting (§6, §9): options are unconditionally overwritten by a project-root `tsfmt.json` when
/// present, matching the original (possibly surprising) behavior rather than merging.
async fn on_formatting(_: LspServerState, params: DocumentFormattingParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Vec<ts_lsp_abstractions::lsp_types::TextEdit>>> {
	let uri = params.text_document.uri.clone();
	let Some(path) = translation::uri_to_path(uri.as_str()) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let mut format_options = serde_json::json!({
		"tabSize": params.options.tab_size,
		"indentSize": params.options.tab_size,
		"convertTabsToSpaces": params.options.insert_spaces,
		"newLineCharacter": "\n",
	});

	if let Some(settings) = load_format_settings(&state).await {
		format_options = settings;
	}

	let mut arguments = serde_json::json!({
		"file": path.to_string_lossy(),
		"line": 1,
		"offset": 1,
		"endLine": i32::MAX,
		"endOffset": i32::MAX,
	});

	if let Some(object) = arguments.as_object_mut() {
		if let Some(options_object) = format_options.as_object() {
			for (key, value) in options_object {
				object.insert(key.clone(), value.clone());
			}
		}
	}

	match analyzer.request("format", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<Vec<crate::analyzer::protocol::AnalyzerTextChange>>(body) {
			Ok(changes) => Ok(Some(translation::text_edits_from_analyzer_changes(&changes))),
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("format request failed: {}", err);

			Ok(None)
		}
	}
}

async fn load_format_settings(state: &Arc<AsyncRwLock<State>>) -> Option<serde_json::Value> {
	let (format_settings, workspace_root) = {
		let state = state.read().await;

		(state.format_settings.clone(), state.workspace_root.read().await.clone())
	};

	{
		let cache = format_settings.read().await;

		if cache.loaded {
			return cache.settings.clone();
		}
	}

	let root = workspace_root?;
	let settings = std::fs::read_to_string(root.join("tsfmt.json")).ok().and_then(|contents| serde_json::from_str::<serde_json::Value>(&contents).ok());

	if settings.is_none() {
		if root.join("tsfmt.json").exists() {
			warn!("failed to parse tsfmt.json; ignoring");
		}
	}

	let mut cache = format_settings.write().await;

	cache.loaded = true;
	cache.settings = settings.clone();

	settings
}

/// Maps an `outliningSpans` entry to a folding range, applying the two corrections named in §4.5.
fn folding_range_from_span(span: &OutliningSpan, document: &Document) -> Option<FoldingRange> {
	let kind = match span.kind.as_str() {
		"comment" => Some(FoldingRangeKind::Comment),
		"region" => Some(FoldingRangeKind::Region),
		"imports" => Some(FoldingRangeKind::Imports),
		_ => None,
	};

	let range = translation::range_from_analyzer(&span.text_span);

	if span.kind == "comment" {
		let start_line_text = document.line_text(range.start.line as usize);

		if is_endregion_comment(&start_line_text) {
			return None;
		}
	}

	let mut end_line = range.end.line;

	let end_offset = document.offset_at(range.end);

	if end_offset > 0 {
		let text = document.get_text();

		if text.encode_utf16().nth(end_offset.saturating_sub(1)) == Some(u16::from(b'}')) {
			end_line = end_line.max(range.start.line + 1) - 1;
		}
	}

	Some(FoldingRange {
		start_line: range.start.line,
		start_character: None,
		end_line,
		end_character: None,
		kind,
		collapsed_text: None,
	})
}

fn is_endregion_comment(line: &str) -> bool {
	regex::Regex::new(r"(?i)^\s*//\s*#endregion").map(|re| re.is_match(line)).unwrap_or(false)
}

async fn on_folding_range(_: LspServerState, params: FoldingRangeParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<Vec<FoldingRange>>> {
	let uri = params.text_document.uri.clone();
	let Some(path) = translation::uri_to_path(uri.as_str()) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let document = {
		let state = state.read().await;
		let documents = state.documents.read().await;

		documents.get(uri.as_str()).cloned()
	};

	let Some(document) = document else { return Ok(None) };

	let arguments = serde_json::json!({ "file": path.to_string_lossy() });

	match analyzer.request("outliningSpans", Some(arguments), None).await {
		Ok(body) => match serde_json::from_value::<Vec<OutliningSpan>>(body) {
			Ok(spans) => Ok(Some(spans.iter().filter_map(|span| folding_range_from_span(span, &document)).collect())),
			Err(_) => Ok(None),
		},
		Err(err) => {
			warn!("outlining spans request failed: {}", err);

			Ok(None)
		}
	}
}

/// Composes quick-fixes, applicable refactors, and organize-imports into one code-action list
/// (§4.5), preserving that order.
async fn on_code_action(_: LspServerState, params: CodeActionParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<CodeActionResponse>> {
	let uri = params.text_document.uri.clone();
	let Some(path) = translation::uri_to_path(uri.as_str()) else { return Ok(None) };
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };

	let start = translation::position_to_analyzer(params.range.start);
	let end = translation::position_to_analyzer(params.range.end);

	let error_codes: Vec<i64> = params
		.context
		.diagnostics
		.iter()
		.filter_map(|diagnostic: &Diagnostic| match diagnostic.code {
			Some(NumberOrString::Number(code)) => Some(code as i64),
			_ => None,
		})
		.collect();

	let mut actions: Vec<CodeActionOrCommand> = Vec::new();

	let fixes_arguments = serde_json::json!({
		"file": path.to_string_lossy(), "startLine": start.line, "startOffset": start.offset,
		"endLine": end.line, "endOffset": end.offset, "errorCodes": error_codes,
	});
	let fixes_analyzer = analyzer.clone();

	let fixes_body =
		interrupt_diagnostics(&state, || async move { fixes_analyzer.request("getCodeFixes", Some(fixes_arguments), None).await }).await;

	if let Ok(body) = fixes_body {
		if let Ok(fixes) = serde_json::from_value::<Vec<CodeFixAction>>(body) {
			for fix in fixes {
				actions.push(CodeActionOrCommand::CodeAction(CodeAction {
					title: fix.description.clone(),
					kind: Some(ts_lsp_abstractions::lsp_types::CodeActionKind::QUICKFIX),
					edit: Some(translation::workspace_edit_from_file_edits(&fix.changes)),
					..Default::default()
				}));
			}
		}
	}

	let refactors_arguments = serde_json::json!({
		"file": path.to_string_lossy(), "startLine": start.line, "startOffset": start.offset,
		"endLine": end.line, "endOffset": end.offset,
	});
	let refactors_analyzer = analyzer.clone();

	let refactors_body = interrupt_diagnostics(&state, || async move {
		refactors_analyzer.request("getApplicableRefactors", Some(refactors_arguments), None).await
	})
	.await;

	if let Ok(body) = refactors_body {
		if let Ok(refactors) = serde_json::from_value::<Vec<ApplicableRefactorInfo>>(body) {
			for group in refactors {
				if group.actions.len() > 1 {
					actions.push(CodeActionOrCommand::Command(Command {
						title: group.description.clone(),
						command: "_typescript.selectRefactoring".into(),
						arguments: Some(vec![serde_json::json!({
							"file": path.to_string_lossy(), "refactorName": group.name,
							"actions": group.actions.iter().map(|a| &a.name).collect::<Vec<_>>(),
						})]),
					}));
				}
				else if let Some(action) = group.actions.first() {
					actions.push(CodeActionOrCommand::Command(Command {
						title: action.description.clone(),
						command: "_typescript.applyRefactoring".into(),
						arguments: Some(vec![serde_json::json!({
							"file": path.to_string_lossy(), "refactorName": group.name, "actionName": action.name,
							"startLine": start.line, "startOffset": start.offset, "endLine": end.line, "endOffset": end.offset,
						})]),
					}));
				}
			}
		}
	}

	if matches!(document_language(&state, &uri).await, Language::TypeScript | Language::TypeScriptReact | Language::JavaScript | Language::JavaScriptReact) {
		actions.push(CodeActionOrCommand::Command(Command {
			title: "Organize Imports".into(),
			command: "_typescript.organizeImports".into(),
			arguments: Some(vec![serde_json::json!({ "file": path.to_string_lossy() })]),
		}));
	}

	Ok(Some(actions))
}

async fn document_language(state: &Arc<AsyncRwLock<State>>, uri: &Url) -> Language {
	let documents = state.read().await.documents.clone();
	let documents = documents.read().await;

	documents.get(uri.as_str()).map(|document| document.language()).unwrap_or(Language::Other)
}

/// A server-initiated custom request that asks the client to start an interactive rename at the
/// location a refactor just introduced (e.g. "Extract to function" naming the new symbol). There
/// is no standard LSP request for this, since `Rename` is client-to-server only.
enum CustomRename {}

impl ts_lsp_abstractions::lsp_types::request::Request for CustomRename {
	type Params = CustomRenameParams;
	type Result = ();

	const METHOD: &'static str = "_typescript.rename";
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomRenameParams {
	text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier,
	position: ts_lsp_abstractions::lsp_types::Position,
}

/// The five server-side `workspace/executeCommand` commands (§4.5). Unknown commands are logged
/// and ignored rather than erroring.
async fn on_execute_command(_: LspServerState, params: ExecuteCommandParams, state: Arc<AsyncRwLock<State>>) -> HandlerResult<Option<serde_json::Value>> {
	let Some(analyzer) = analyzer_of(&state).await else { return Ok(None) };
	let request_manager = state.read().await.request_manager.clone();

	match params.command.as_str() {
		"_typescript.applyWorkspaceEdit" => {
			let Some(edit) = params.arguments.first().and_then(|value| serde_json::from_value::<WorkspaceEdit>(value.clone()).ok()) else {
				return Ok(None);
			};

			let _ = request_manager.send::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams { label: None, edit }).await;

			Ok(None)
		}
		"_typescript.applyCodeAction" => {
			let Some(value) = params.arguments.first() else { return Ok(None) };
			let changes = value.get("changes").and_then(|v| serde_json::from_value::<Vec<FileCodeEdits>>(v.clone()).ok()).unwrap_or_default();

			let edit = translation::workspace_edit_from_file_edits(&changes);

			let _ = request_manager.send::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams { label: None, edit }).await;

			if let Some(commands) = value.get("commands").and_then(|v| v.as_array()) {
				for command in commands {
					let _ = analyzer.request("applyCodeActionCommand", Some(serde_json::json!({ "command": command })), None).await;
				}
			}

			Ok(None)
		}
		"_typescript.applyRefactoring" => {
			let Some(value) = params.arguments.first().cloned() else { return Ok(None) };
			let file = value.get("file").and_then(|v| v.as_str()).map(str::to_owned);

			match analyzer.request("getEditsForRefactor", Some(value.clone()), None).await {
				Ok(body) => match serde_json::from_value::<RefactorEditInfo>(body) {
					Ok(edit_info) => {
						let edit = translation::workspace_edit_from_file_edits(&edit_info.edits);

						let _ = request_manager.send::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams { label: None, edit }).await;

						if let (Some(rename_location), Some(file)) = (edit_info.rename_location, file) {
							let file = edit_info.rename_filename.unwrap_or(file);
							let uri = ts_lsp_abstractions::lsp_types::Url::parse(&translation::path_to_uri(std::path::Path::new(&file))).ok();

							if let Some(uri) = uri {
								let position = translation::position_from_analyzer(&rename_location);
								let rename_params = CustomRenameParams {
									text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri },
									position,
								};

								let _ = request_manager.send_and_receive::<CustomRename>(rename_params).await;
							}
						}
					}
					Err(_) => {
						error!("malformed getEditsForRefactor response");
					}
				},
				Err(err) => warn!("getEditsForRefactor failed: {}", err),
			}

			Ok(None)
		}
		"_typescript.organizeImports" => {
			let Some(file) = params.arguments.first().and_then(|value| value.as_str()) else { return Ok(None) };

			let arguments = serde_json::json!({ "scope": { "type": "file", "args": { "file": file } } });

			match analyzer.request("organizeImports", Some(arguments), None).await {
				Ok(body) => {
					if let Ok(edits) = serde_json::from_value::<Vec<FileCodeEdits>>(body) {
						let edit = translation::workspace_edit_from_file_edits(&edits);

						let _ = request_manager.send::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams { label: None, edit }).await;
					}
				}
				Err(err) => warn!("organizeImports failed: {}", err),
			}

			Ok(None)
		}
		"_typescript.applyCompletionCodeAction" => {
			let Some(value) = params.arguments.first() else { return Ok(None) };
			let Ok(code_actions) = serde_json::from_value::<Vec<CodeFixAction>>(value.clone()) else { return Ok(None) };

			let changes: Vec<FileCodeEdits> = code_actions.iter().flat_map(|action| action.changes.clone()).collect();
			let edit = translation::workspace_edit_from_file_edits(&changes);

			let _ = request_manager.send::<ApplyWorkspaceEdit>(ApplyWorkspaceEditParams { label: None, edit }).await;

			for action in &code_actions {
				for command in &action.commands {
					let _ = analyzer.request("applyCodeActionCommand", Some(serde_json::json!({ "command": command })), None).await;
				}
			}

			Ok(None)
		}
		unknown => {
			warn!(command = unknown, "unknown executeCommand; ignoring");

			Ok(None)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		analyzer::client::AnalyzerEvent,
		analyzer::protocol::{AnalyzerPosition, AnalyzerRange},
		config::ServerConfig,
		json_rpc::message::{Message, Response as RpcResponse},
		lsp::request::RequestManager,
	};
	use std::collections::{HashMap, HashSet};
	use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

	fn doc(text: &str) -> Document { Document::create("file:///a.ts".into(), Language::TypeScript, 1, text, 0) }

	fn span(kind: &str, start_line: i64, end_line: i64) -> OutliningSpan {
		OutliningSpan {
			kind: kind.into(),
			text_span: AnalyzerRange {
				start: AnalyzerPosition { line: start_line, offset: 1 },
				end: AnalyzerPosition { line: end_line, offset: 1 },
			},
		}
	}

	#[test]
	fn is_endregion_comment_matches_common_forms() {
		assert!(is_endregion_comment("// #endregion"));
		assert!(is_endregion_comment("  //#endregion foo"));
		assert!(is_endregion_comment("// #ENDREGION"));
	}

	#[test]
	fn is_endregion_comment_rejects_unrelated_lines() {
		assert!(!is_endregion_comment("// #region foo"));
		assert!(!is_endregion_comment("const x = 1; // endregion is not a directive here"));
		assert!(!is_endregion_comment(""));
	}

	#[test]
	fn folding_range_from_span_suppresses_endregion_comment_spans() {
		let document = doc("// #endregion\nconst x = 1;\n");
		let result = folding_range_from_span(&span("comment", 1, 1), &document);

		assert!(result.is_none());
	}

	#[test]
	fn folding_range_from_span_maps_region_kind() {
		let document = doc("// #region foo\nconst x = 1;\n// #endregion\n");
		let result = folding_range_from_span(&span("region", 1, 3), &document).unwrap();

		assert_eq!(result.kind, Some(FoldingRangeKind::Region));
		assert_eq!(result.start_line, 0);
	}

	#[test]
	fn folding_range_from_span_passes_through_unknown_kind_with_no_folding_kind() {
		let document = doc("function foo() {\n  return 1;\n}\n");
		let result = folding_range_from_span(&span("code", 1, 3), &document).unwrap();

		assert_eq!(result.kind, None);
	}

	/// Reads newline-delimited analyzer requests off `read_half` and writes back
	/// `Content-Length`-framed responses, standing in for a real `tsserver` subprocess. Every request
	/// is recorded in `calls`; commands named in `stall` are recorded but never answered, so a test can
	/// exercise an in-flight, never-completing analyzer round trip.
	async fn run_fake_analyzer(
		read_half: impl AsyncRead + Unpin,
		mut write_half: impl AsyncWrite + Unpin,
		responses: HashMap<&'static str, serde_json::Value>,
		stall: HashSet<&'static str>,
		calls: Arc<AsyncRwLock<Vec<(String, serde_json::Value)>>>,
	) {
		let mut reader = BufReader::new(read_half);

		loop {
			let mut line = String::new();

			match reader.read_line(&mut line).await {
				Ok(0) | Err(_) => break,
				Ok(_) => {}
			}

			let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim_end()) else { continue };
			let seq = value.get("seq").and_then(|v| v.as_i64()).unwrap_or(0);
			let command = value.get("command").and_then(|v| v.as_str()).unwrap_or_default().to_string();
			let arguments = value.get("arguments").cloned().unwrap_or(serde_json::Value::Null);

			calls.write().await.push((command.clone(), arguments));

			if stall.contains(command.as_str()) {
				continue;
			}

			let body = responses.get(command.as_str()).cloned().unwrap_or(serde_json::Value::Null);
			let payload = serde_json::json!({ "type": "response", "request_seq": seq, "success": true, "body": body });
			let Ok(text) = serde_json::to_vec(&payload) else { continue };
			let header = format!("Content-Length: {}\r\n\r\n", text.len());

			if write_half.write_all(header.as_bytes()).await.is_err() { break; }
			if write_half.write_all(&text).await.is_err() { break; }
			if write_half.flush().await.is_err() { break; }
		}
	}

	/// A handle onto the fake analyzer's recorded call log, for asserting which commands a handler
	/// issued (and in what order) without depending on wall-clock timing.
	struct FakeAnalyzer {
		calls: Arc<AsyncRwLock<Vec<(String, serde_json::Value)>>>,
	}

	impl FakeAnalyzer {
		async fn calls_for(&self, command: &str) -> usize {
			self.calls.read().await.iter().filter(|(c, _)| c == command).count()
		}

		async fn last_call(&self, command: &str) -> Option<serde_json::Value> {
			self.calls.read().await.iter().rev().find(|(c, _)| c == command).map(|(_, args)| args.clone())
		}

		/// Polls until `command` has been observed at least `count` times, or panics after ~2 seconds.
		async fn wait_for(&self, command: &str, count: usize) {
			for _ in 0..200 {
				if self.calls_for(command).await >= count {
					return;
				}

				tokio::time::sleep(std::time::Duration::from_millis(10)).await;
			}

			panic!("timed out waiting for {} call(s) to '{}'", count, command);
		}
	}

	/// Builds a [`State`] wired to an in-memory fake analyzer (via [`AnalyzerClient::start_with_io`])
	/// and a fake LSP client that acknowledges every server-initiated request with a null result.
	async fn harness(responses: HashMap<&'static str, serde_json::Value>, stall: HashSet<&'static str>) -> (Arc<AsyncRwLock<State>>, FakeAnalyzer) {
		let (client_stdin, server_stdin) = tokio::io::duplex(16 * 1024);
		let (server_stdout, client_stdout) = tokio::io::duplex(16 * 1024);
		let (events_tx, _events_rx) = async_channel::unbounded::<AnalyzerEvent>();

		let analyzer = Arc::new(AnalyzerClient::start_with_io(client_stdin, client_stdout, events_tx));
		let calls = Arc::new(AsyncRwLock::new(Vec::new()));

		tokio::spawn(run_fake_analyzer(server_stdin, server_stdout, responses, stall, calls.clone()));

		let (to_client_tx, to_client_rx) = async_channel::unbounded::<Message>();
		let (from_client_tx, from_client_rx) = async_channel::unbounded::<Message>();
		let request_manager = RequestManager::new((to_client_tx, from_client_rx));
		let cancel_source = cancellation::CancellationTokenSource::new();
		let cancel_token = cancel_source.token().clone();

		tokio::spawn({
			let request_manager = request_manager.clone();

			async move {
				let _cancel_source = cancel_source;

				let _ = request_manager.start(cancel_token).await;
			}
		});

		tokio::spawn(async move {
			while let Ok(message) = to_client_rx.recv().await {
				if let Message::Request(request) = message {
					let response = Message::Response(RpcResponse { id: request.id, result: Some(serde_json::Value::Null), error: None });

					let _ = from_client_tx.send(response).await;
				}
			}
		});

		let mut state = State::new(request_manager, ServerConfig::default());

		state.analyzer = Some(analyzer);

		(Arc::new(AsyncRwLock::new(state)), FakeAnalyzer { calls })
	}

	fn text_document_item(uri: Url, text: &str) -> ts_lsp_abstractions::lsp_types::TextDocumentItem {
		ts_lsp_abstractions::lsp_types::TextDocumentItem { uri, language_id: "typescript".into(), version: 1, text: text.into() }
	}

	#[tokio::test]
	async fn open_then_hover_returns_rendered_markdown() {
		let mut responses = HashMap::new();
		responses.insert(
			"quickinfo",
			serde_json::json!({
				"displayString": "const x: number",
				"documentation": "",
				"tags": [],
				"start": { "line": 1, "offset": 7 },
				"end": { "line": 1, "offset": 8 },
			}),
		);

		let (state, _fake) = harness(responses, HashSet::new()).await;
		let uri = Url::parse("file:///tmp/a.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri.clone(), "const x = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();

		let result = on_hover(
			LspServerState::ActiveInitialized,
			HoverParams {
				text_document_position_params: ts_lsp_abstractions::lsp_types::TextDocumentPositionParams {
					text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri },
					position: ts_lsp_abstractions::lsp_types::Position::new(0, 6),
				},
				work_done_progress_params: Default::default(),
			},
			state,
		)
		.await
		.unwrap();

		let hover = result.expect("expected a hover result");

		match hover.contents {
			HoverContents::Markup(markup) => assert!(markup.value.contains("const x: number")),
			other => panic!("expected markup hover contents, got {:?}", other),
		}
	}

	#[tokio::test]
	async fn incremental_change_then_definition_returns_analyzer_location() {
		let mut responses = HashMap::new();
		responses.insert(
			"definition",
			serde_json::json!([{ "file": "/tmp/b.ts", "start": { "line": 2, "offset": 1 }, "end": { "line": 2, "offset": 4 } }]),
		);

		let (state, fake) = harness(responses, HashSet::new()).await;
		let uri = Url::parse("file:///tmp/a.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri.clone(), "const foo = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();

		on_did_change(
			LspServerState::ActiveInitialized,
			DidChangeTextDocumentParams {
				text_document: ts_lsp_abstractions::lsp_types::VersionedTextDocumentIdentifier { uri: uri.clone(), version: 2 },
				content_changes: vec![ts_lsp_abstractions::lsp_types::TextDocumentContentChangeEvent {
					range: Some(ts_lsp_abstractions::lsp_types::Range::new(
						ts_lsp_abstractions::lsp_types::Position::new(0, 6),
						ts_lsp_abstractions::lsp_types::Position::new(0, 9),
					)),
					range_length: None,
					text: "bar".into(),
				}],
			},
			state.clone(),
		)
		.await
		.unwrap();

		let result = on_definition(
			LspServerState::ActiveInitialized,
			GotoDefinitionParams {
				text_document_position_params: ts_lsp_abstractions::lsp_types::TextDocumentPositionParams {
					text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri },
					position: ts_lsp_abstractions::lsp_types::Position::new(0, 7),
				},
				work_done_progress_params: Default::default(),
				partial_result_params: Default::default(),
			},
			state,
		)
		.await
		.unwrap();

		match result.expect("expected a definition result") {
			GotoDefinitionResponse::Scalar(location) => {
				assert_eq!(location.uri.as_str(), "file:///tmp/b.ts");
				assert_eq!(location.range.start.line, 1);
			}
			other => panic!("expected a single location, got {:?}", other),
		}

		assert_eq!(fake.calls_for("change").await, 1);
	}

	#[tokio::test]
	async fn completion_interrupts_and_reissues_diagnostics() {
		let mut responses = HashMap::new();
		responses.insert("completions", serde_json::json!([]));

		let mut stall = HashSet::new();
		stall.insert("geterr");

		let (state, fake) = harness(responses, stall).await;
		let uri = Url::parse("file:///tmp/a.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri.clone(), "const x = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();

		// The open's own diagnostics round is left in flight (stalled `geterr`) before completion runs.
		fake.wait_for("geterr", 1).await;

		let result = on_completion(
			LspServerState::ActiveInitialized,
			CompletionParams {
				text_document_position: ts_lsp_abstractions::lsp_types::TextDocumentPositionParams {
					text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri },
					position: ts_lsp_abstractions::lsp_types::Position::new(0, 6),
				},
				work_done_progress_params: Default::default(),
				partial_result_params: Default::default(),
				context: None,
			},
			state,
		)
		.await
		.unwrap();

		assert!(result.is_some(), "completion should resolve even though diagnostics never respond");
		assert_eq!(fake.calls_for("completions").await, 1);

		// Completing interrupts the in-flight round and reissues it once the completion is served.
		fake.wait_for("geterr", 2).await;
	}

	#[tokio::test]
	async fn diagnostics_requests_files_least_recently_used_first() {
		let (state, fake) = harness(HashMap::new(), HashSet::new()).await;
		let uri_a = Url::parse("file:///tmp/a.ts").unwrap();
		let uri_b = Url::parse("file:///tmp/b.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri_a.clone(), "const a = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();
		fake.wait_for("geterr", 1).await;

		tokio::time::sleep(std::time::Duration::from_millis(5)).await;

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri_b.clone(), "const b = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();
		fake.wait_for("geterr", 2).await;

		tokio::time::sleep(std::time::Duration::from_millis(5)).await;

		on_did_change(
			LspServerState::ActiveInitialized,
			DidChangeTextDocumentParams {
				text_document: ts_lsp_abstractions::lsp_types::VersionedTextDocumentIdentifier { uri: uri_a.clone(), version: 2 },
				content_changes: vec![ts_lsp_abstractions::lsp_types::TextDocumentContentChangeEvent {
					range: None,
					range_length: None,
					text: "const a = 2;\n".into(),
				}],
			},
			state,
		)
		.await
		.unwrap();
		fake.wait_for("geterr", 3).await;

		let last_geterr = fake.last_call("geterr").await.expect("expected a geterr call");
		let files: Vec<&str> = last_geterr.get("files").and_then(|v| v.as_array()).expect("files array").iter().filter_map(|v| v.as_str()).collect();

		assert_eq!(files, vec!["/tmp/b.ts", "/tmp/a.ts"], "the file not touched since its open should be requested first");
	}

	#[tokio::test]
	async fn folding_range_request_applies_heuristics_end_to_end() {
		let text = "// #region foo\nconst x = 1;\n// #endregion\n";

		let mut responses = HashMap::new();
		responses.insert(
			"outliningSpans",
			serde_json::json!([
				{ "textSpan": { "start": { "line": 1, "offset": 1 }, "end": { "line": 3, "offset": 1 } }, "kind": "region" },
				{ "textSpan": { "start": { "line": 3, "offset": 1 }, "end": { "line": 3, "offset": 14 } }, "kind": "comment" },
			]),
		);

		let (state, _fake) = harness(responses, HashSet::new()).await;
		let uri = Url::parse("file:///tmp/a.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri.clone(), text) },
			state.clone(),
		)
		.await
		.unwrap();

		let result = on_folding_range(
			LspServerState::ActiveInitialized,
			FoldingRangeParams {
				text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri },
				work_done_progress_params: Default::default(),
				partial_result_params: Default::default(),
			},
			state,
		)
		.await
		.unwrap();

		let ranges = result.expect("expected folding ranges");

		assert_eq!(ranges.len(), 1, "the #endregion comment span should be suppressed");
		assert_eq!(ranges[0].kind, Some(FoldingRangeKind::Region));
		assert_eq!(ranges[0].start_line, 0);
	}

	#[tokio::test]
	async fn rename_round_trip_returns_workspace_edit_from_analyzer_locations() {
		let mut responses = HashMap::new();
		responses.insert(
			"rename",
			serde_json::json!({
				"info": { "canRename": true },
				"locs": [{ "file": "/tmp/a.ts", "locs": [{ "start": { "line": 1, "offset": 7 }, "end": { "line": 1, "offset": 10 } }] }],
			}),
		);

		let (state, _fake) = harness(responses, HashSet::new()).await;
		let uri = Url::parse("file:///tmp/a.ts").unwrap();

		on_did_open(
			LspServerState::ActiveInitialized,
			DidOpenTextDocumentParams { text_document: text_document_item(uri.clone(), "const foo = 1;\n") },
			state.clone(),
		)
		.await
		.unwrap();

		let result = on_rename(
			LspServerState::ActiveInitialized,
			RenameParams {
				text_document_position: ts_lsp_abstractions::lsp_types::TextDocumentPositionParams {
					text_document: ts_lsp_abstractions::lsp_types::TextDocumentIdentifier { uri: uri.clone() },
					position: ts_lsp_abstractions::lsp_types::Position::new(0, 6),
				},
				new_name: "bar".into(),
				work_done_progress_params: Default::default(),
			},
			state,
		)
		.await
		.unwrap();

		let edit = result.expect("expected a workspace edit");
		let changes = edit.changes.expect("expected a per-file changes map");
		let text_edits = changes.get(&uri).expect("expected edits for the renamed file");

		assert_eq!(text_edits.len(), 1);
		assert_eq!(text_edits[0].new_text, "bar");
	}
}
