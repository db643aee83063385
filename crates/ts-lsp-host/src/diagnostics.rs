//! The diagnostic queue (C4): joins the analyzer's three independent diagnostic streams per file
//! and republishes the union to the editor.

use std::{collections::HashMap, path::Path, sync::Arc};

use async_rwlock::RwLock as AsyncRwLock;
use ts_lsp_abstractions::lsp_types::{
	notification::PublishDiagnostics, Diagnostic, DiagnosticSeverity, PublishDiagnosticsParams, Url,
};

use crate::{
	analyzer::{
		client::DiagnosticKind,
		protocol::{AnalyzerDiagnostic, AnalyzerRange},
	},
	lsp::request::RequestManager,
	translation,
};

/// Tracks the most recent diagnostic list per (file, kind) and publishes the per-file union.
pub(crate) struct DiagnosticQueue {
	state: AsyncRwLock<HashMap<String, HashMap<DiagnosticKind, Vec<AnalyzerDiagnostic>>>>,
}

impl DiagnosticQueue {
	pub(crate) fn new() -> Self { Self { state: AsyncRwLock::new(HashMap::new()) } }

	/// Replaces the per-kind diagnostic list for `file` and publishes the union across kinds.
	pub(crate) async fn handle_event(
		&self,
		requests: &RequestManager,
		file: &str,
		kind: DiagnosticKind,
		diagnostics: Vec<AnalyzerDiagnostic>,
	) {
		let union = {
			let mut state = self.state.write().await;
			let per_kind = state.entry(file.to_string()).or_default();

			per_kind.insert(kind, diagnostics);

			per_kind.values().flatten().cloned().collect::<Vec<_>>()
		};

		self.publish(requests, file, union).await;
	}

	/// Publishes an empty diagnostic list for `file` (used when the document is closed) and removes
	/// any cached state for it.
	pub(crate) async fn clear(&self, requests: &RequestManager, file: &str) {
		self.state.write().await.remove(file);

		self.publish(requests, file, Vec::new()).await;
	}

	async fn publish(&self, requests: &RequestManager, file: &str, diagnostics: Vec<AnalyzerDiagnostic>) {
		let Some(uri) = to_url(file) else { return };
		let diagnostics = diagnostics.into_iter().map(translate_diagnostic).collect();

		let _ = requests
			.send_notification::<PublishDiagnostics>(PublishDiagnosticsParams { uri, diagnostics, version: None })
			.await;
	}
}

fn to_url(file: &str) -> Option<Url> { Url::parse(&translation::path_to_uri(Path::new(file))).ok() }

fn translate_diagnostic(diagnostic: AnalyzerDiagnostic) -> Diagnostic {
	Diagnostic {
		range: translation::range_from_analyzer(&AnalyzerRange { start: diagnostic.start, end: diagnostic.end }),
		severity: Some(severity_from_category(&diagnostic.category)),
		code: diagnostic.code.map(|code| ts_lsp_abstractions::lsp_types::NumberOrString::Number(code as i32)),
		source: Some("typescript".into()),
		message: diagnostic.text,
		..Default::default()
	}
}

fn severity_from_category(category: &str) -> DiagnosticSeverity {
	match category {
		"error" => DiagnosticSeverity::ERROR,
		"warning" => DiagnosticSeverity::WARNING,
		"suggestion" => DiagnosticSeverity::HINT,
		_ => DiagnosticSeverity::INFORMATION,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ts_lsp_abstractions::lsp_types::request::Request;
	use crate::{analyzer::protocol::AnalyzerPosition, json_rpc::message::Message};

	fn diagnostic(text: &str, category: &str) -> AnalyzerDiagnostic {
		AnalyzerDiagnostic {
			start: AnalyzerPosition { line: 1, offset: 1 },
			end: AnalyzerPosition { line: 1, offset: 2 },
			text: text.into(),
			category: category.into(),
			code: None,
		}
	}

	#[tokio::test]
	async fn union_of_two_kinds_publishes_both() {
		let (requests_tx, requests_rx) = async_channel::unbounded();
		let (_responses_tx, responses_rx) = async_channel::unbounded();
		let requests = RequestManager::new((requests_tx, responses_rx));
		let queue = DiagnosticQueue::new();

		queue.handle_event(&requests, "/a/b.ts", DiagnosticKind::Syntactic, vec![diagnostic("syntax", "error")]).await;
		queue.handle_event(&requests, "/a/b.ts", DiagnosticKind::Semantic, vec![diagnostic("semantic", "warning")]).await;

		// The second publish carries the union of both kinds.
		let _first = requests_rx.recv().await.unwrap();
		let second = requests_rx.recv().await.unwrap();

		if let Message::Notification(notification) = second {
			let params: PublishDiagnosticsParams = serde_json::from_value(notification.params).unwrap();

			assert_eq!(params.diagnostics.len(), 2);
		}
		else {
			panic!("expected a notification");
		}

		drop(responses_rx);
	}
}
