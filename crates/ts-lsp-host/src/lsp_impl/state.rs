use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_rwlock::RwLock as AsyncRwLock;
use cancellation::CancellationTokenSource;
use serde_json::Value;
use ts_lsp_abstractions::lsp_types::TraceValue;

use crate::{
	analyzer::client::AnalyzerClient, config::ServerConfig, diagnostics::DiagnosticQueue, document::Document,
	lsp::request::RequestManager, tracing::TraceValueAccessor,
};

/// The lazily-loaded, cached contents of the workspace's `tsfmt.json`, if any.
#[derive(Clone, Default)]
pub(crate) struct FormatSettingsCache {
	pub loaded: bool,
	pub settings: Option<Value>,
}

/// The server's active state (C5): the open-document map, a handle to the analyzer client once
/// `initialize` has run, the diagnostic queue, and the single-slot diagnostics cancellation token.
#[derive(Clone)]
pub(crate) struct State {
	/// The optional [`TraceValueAccessor`] that can be used to set the trace value used in the LSP tracing layer.
	pub trace_value: Option<TraceValueAccessor>,

	/// Manages requests and notifications sent from the server to the LSP client.
	pub request_manager: RequestManager,

	/// Configuration supplied on the command line.
	pub config: Arc<ServerConfig>,

	/// The client's reported workspace root, used for analyzer discovery and the `tsfmt.json` lookup.
	pub workspace_root: Arc<AsyncRwLock<Option<PathBuf>>>,

	/// The open-document map (§3): the sole ground truth for "is this file open".
	pub documents: Arc<AsyncRwLock<HashMap<String, Document>>>,

	/// The analyzer client, once constructed during `initialize`. `None` if discovery failed.
	pub analyzer: Option<Arc<AnalyzerClient>>,

	/// Joins and republishes the analyzer's diagnostic events.
	pub diagnostics: Arc<DiagnosticQueue>,

	/// The single in-flight `geterr` round's cancellation source, if any (§4.5).
	pub diagnostics_token: Arc<AsyncRwLock<Option<CancellationTokenSource>>>,

	/// The cached `tsfmt.json` contents, loaded on first formatting request.
	pub format_settings: Arc<AsyncRwLock<FormatSettingsCache>>,
}

impl State {
	/// Initializes a new [`State`] for a freshly constructed [`RequestManager`] and [`ServerConfig`].
	pub(crate) fn new(request_manager: RequestManager, config: ServerConfig) -> Self {
		Self {
			trace_value: None,
			request_manager,
			config: Arc::new(config),
			workspace_root: Arc::new(AsyncRwLock::new(None)),
			documents: Arc::new(AsyncRwLock::new(HashMap::new())),
			analyzer: None,
			diagnostics: Arc::new(DiagnosticQueue::new()),
			diagnostics_token: Arc::new(AsyncRwLock::new(None)),
			format_settings: Arc::new(AsyncRwLock::new(FormatSettingsCache::default())),
		}
	}

	/// Sets the LSP tracing layer's trace value, if a tracing layer is installed.
	pub(crate) fn set_trace_value(&self, value: TraceValue) {
		if let Some(trace_value) = &self.trace_value {
			trace_value.set(value);
		}
	}
}
