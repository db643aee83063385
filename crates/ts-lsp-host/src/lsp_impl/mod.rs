//! One module per [`crate::lsp::state::LspServerState`] variant, each exposing a
//! `create_dispatcher()` function that builds the [`crate::fsm::LspServerStateDispatcher`] for that
//! state.

use std::sync::Arc;

use async_rwlock::RwLock as AsyncRwLock;

use crate::translation;

pub(crate) mod active_initialized;
pub(crate) mod active_uninitialized;
pub(crate) mod initializing;
pub(crate) mod shutting_down;
pub(crate) mod state;
pub(crate) mod stopped;

/// The `workspace/executeCommand` commands this server advertises and implements, shared between
/// the capabilities advertised on `initialize` and the dispatcher in [`active_initialized`].
pub(crate) const EXECUTE_COMMANDS: &[&str] = &[
	"_typescript.applyWorkspaceEdit",
	"_typescript.applyCodeAction",
	"_typescript.applyRefactoring",
	"_typescript.organizeImports",
	"_typescript.applyCompletionCodeAction",
];

/// Notifies the analyzer of every open file's closure and tears down its subprocess. Shared by the
/// `exit` handler in every state that may have a live analyzer (§5).
pub(crate) async fn stop_analyzer(state: &Arc<AsyncRwLock<state::State>>) {
	let analyzer = state.read().await.analyzer.clone();

	let Some(analyzer) = analyzer else { return };

	let documents = state.read().await.documents.clone();
	let open_files: Vec<String> = documents
		.read()
		.await
		.keys()
		.filter_map(|uri| translation::uri_to_path(uri))
		.map(|path| path.to_string_lossy().into_owned())
		.collect();

	analyzer.stop(open_files.into_iter()).await;
}
