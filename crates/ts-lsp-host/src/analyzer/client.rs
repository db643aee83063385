//! The analyzer client (C3): a request/response multiplexer over a long-lived child process that
//! speaks the analyzer's line-delimited-outgoing, `Content-Length`-framed-incoming JSON protocol.

use std::{
	collections::HashMap,
	path::PathBuf,
	process::Stdio,
	sync::{
		atomic::{AtomicI64, Ordering},
		Arc,
	},
	time::Duration,
};

use async_channel::Sender;
use async_rwlock::RwLock as AsyncRwLock;
use cancellation::CancellationToken;
use serde_json::Value;
use thiserror::Error;
use tokio::{
	io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
	process::{Child, Command},
	sync::Mutex as AsyncMutex,
};
use ts_lsp_abstractions::{
	futures_extensions::FutureCompletionSource,
	tracing::{error, warn},
};

use super::protocol::{AnalyzerDiagnostic, DiagnosticEventBody, IncomingMessage, OutgoingMessage};

/// A recoverable or fatal failure from the analyzer client, distinct from [`crate::lsp::LspProtocolError`]
/// so that handlers can tell "this particular request failed" (category 3, §7) apart from "the
/// transport is dead" (category 4, §7).
#[derive(Error, Debug, Clone)]
pub(crate) enum AnalyzerClientError {
	#[error("the analyzer reported a failure: {0}")]
	RequestFailed(String),
	#[error("the request was cancelled")]
	Cancelled,
	#[error("the analyzer transport failed")]
	Transport,
	#[error("failed to launch the analyzer process: {0}")]
	Spawn(String),
}

/// The kind of diagnostic a `*Diag` event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DiagnosticKind {
	Semantic,
	Syntactic,
	Suggestion,
}

impl DiagnosticKind {
	fn from_event_name(name: &str) -> Option<Self> {
		match name {
			"semanticDiag" => Some(DiagnosticKind::Semantic),
			"syntaxDiag" => Some(DiagnosticKind::Syntactic),
			"suggestionDiag" => Some(DiagnosticKind::Suggestion),
			_ => None,
		}
	}
}

/// An event fanned out from the reader task to C4 (or any other subscriber).
#[derive(Debug, Clone)]
pub(crate) enum AnalyzerEvent {
	Diagnostic { kind: DiagnosticKind, file: String, diagnostics: Vec<AnalyzerDiagnostic> },
	Other { name: String, body: Option<Value> },
}

#[derive(Debug, Clone, Copy)]
enum AwaitedResponseError {
	Cancelled,
	Transport,
}

#[derive(Debug, Clone)]
enum AnalyzerOutcome {
	Success(Value),
	Failure(String),
}

type PendingSlot = FutureCompletionSource<Arc<AnalyzerOutcome>, AwaitedResponseError>;

/// A long-lived client for the analyzer subprocess.
pub(crate) struct AnalyzerClient {
	outgoing: Sender<OutgoingMessage>,
	seq: AtomicI64,
	pending: Arc<AsyncRwLock<HashMap<i64, Arc<PendingSlot>>>>,
	child: AsyncMutex<Option<Child>>,
}

impl AnalyzerClient {
	/// Spawns the analyzer subprocess, attaches its stdio, and starts the reader/writer tasks.
	///
	/// Every `type: "event"` message the reader observes is handed off to `events` — a queue, not a
	/// blocking callback, so the reader task is never held up by a slow subscriber.
	pub(crate) async fn start(
		tsserver_path: &std::path::Path,
		log_file: Option<&std::path::Path>,
		log_verbosity: Option<&str>,
		events: Sender<AnalyzerEvent>,
	) -> Result<Self, AnalyzerClientError> {
		let mut command = Command::new(tsserver_path);

		if let Some(log_file) = log_file {
			command.arg("--logFile").arg(log_file);
		}

		if let Some(verbosity) = log_verbosity {
			command.arg("--logVerbosity").arg(verbosity);
		}

		let mut child = command
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|err| AnalyzerClientError::Spawn(err.to_string()))?;

		let stdin = child.stdin.take().expect("child spawned with piped stdin");
		let stdout = child.stdout.take().expect("child spawned with piped stdout");

		Ok(Self::from_io(stdin, stdout, Some(child), events))
	}

	/// Builds a client around an already-connected transport, optionally owning the subprocess
	/// that backs it. Shared by [`Self::start`] (real `tsserver` stdio) and, in tests, an in-memory
	/// duplex pipe standing in for one.
	fn from_io(
		stdin: impl AsyncWrite + Unpin + Send + 'static,
		stdout: impl AsyncRead + Unpin + Send + 'static,
		child: Option<Child>,
		events: Sender<AnalyzerEvent>,
	) -> Self {
		let pending = Arc::new(AsyncRwLock::new(HashMap::<i64, Arc<PendingSlot>>::new()));
		let (outgoing, outgoing_receiver) = async_channel::unbounded::<OutgoingMessage>();

		tokio::spawn(Self::writer_task(stdin, outgoing_receiver));
		tokio::spawn(Self::reader_task(stdout, pending.clone(), events));

		Self { outgoing, seq: AtomicI64::new(0), pending, child: AsyncMutex::new(child) }
	}

	#[cfg(test)]
	pub(crate) fn start_with_io(
		stdin: impl AsyncWrite + Unpin + Send + 'static,
		stdout: impl AsyncRead + Unpin + Send + 'static,
		events: Sender<AnalyzerEvent>,
	) -> Self {
		Self::from_io(stdin, stdout, None, events)
	}

	async fn writer_task(mut stdin: impl AsyncWrite + Unpin, outgoing: async_channel::Receiver<OutgoingMessage>) {
		while let Ok(message) = outgoing.recv().await {
			let Ok(mut line) = serde_json::to_vec(&message) else { continue };

			line.push(b'\n');

			if stdin.write_all(&line).await.is_err() || stdin.flush().await.is_err() {
				break;
			}
		}
	}

	async fn reader_task(
		stdout: impl AsyncRead + Unpin,
		pending: Arc<AsyncRwLock<HashMap<i64, Arc<PendingSlot>>>>,
		events: Sender<AnalyzerEvent>,
	) {
		let mut reader = BufReader::new(stdout);

		loop {
			match read_framed_message(&mut reader).await {
				Ok(Some(message)) => Self::dispatch_incoming(message, &pending, &events).await,
				Ok(None) => break,
				Err(err) => {
					error!("analyzer transport read error: {}", err);
					break;
				}
			}
		}

		Self::fail_all_pending(&pending).await;
	}

	async fn dispatch_incoming(
		message: IncomingMessage,
		pending: &Arc<AsyncRwLock<HashMap<i64, Arc<PendingSlot>>>>,
		events: &Sender<AnalyzerEvent>,
	) {
		match message {
			IncomingMessage::Response { request_seq, success, body, message } => {
				let slot = pending.write().await.remove(&request_seq);

				let Some(slot) = slot else {
					warn!("received a response (seq {}) with no matching pending request", request_seq);
					return;
				};

				let outcome = if success {
					AnalyzerOutcome::Success(body.unwrap_or(Value::Null))
				}
				else {
					AnalyzerOutcome::Failure(message.unwrap_or_else(|| "unknown analyzer error".into()))
				};

				let _ = slot.set_value(Arc::new(outcome));
			}
			IncomingMessage::Event { event, body } => {
				let analyzer_event = match DiagnosticKind::from_event_name(&event) {
					Some(kind) => match body.and_then(|body| serde_json::from_value::<DiagnosticEventBody>(body).ok()) {
						Some(parsed) => AnalyzerEvent::Diagnostic { kind, file: parsed.file, diagnostics: parsed.diagnostics },
						None => return,
					},
					None => AnalyzerEvent::Other { name: event, body },
				};

				let _ = events.send(analyzer_event).await;
			}
		}
	}

	async fn fail_all_pending(pending: &Arc<AsyncRwLock<HashMap<i64, Arc<PendingSlot>>>>) {
		let mut pending = pending.write().await;

		for (_, slot) in pending.drain() {
			let _ = slot.set_err(AwaitedResponseError::Transport);
		}
	}

	fn next_seq(&self) -> i64 { self.seq.fetch_add(1, Ordering::Relaxed) }

	/// Sends `command` to the analyzer and awaits its response, optionally racing against
	/// cancellation. Cancelling releases the waiter; the analyzer keeps working and its eventual
	/// response (if any) is discarded when it arrives.
	pub(crate) async fn request(
		&self,
		command: &str,
		arguments: Option<Value>,
		cancel_token: Option<Arc<CancellationToken>>,
	) -> Result<Value, AnalyzerClientError> {
		let seq = self.next_seq();
		let slot: Arc<PendingSlot> = Arc::new(FutureCompletionSource::new());

		self.pending.write().await.insert(seq, slot.clone());

		if self.outgoing.send(OutgoingMessage::new(seq, command, arguments)).await.is_err() {
			self.pending.write().await.remove(&seq);

			return Err(AnalyzerClientError::Transport);
		}

		let outcome = match cancel_token {
			Some(cancel_token) => race_with_cancellation(&slot, cancel_token).await,
			None => slot.future().await,
		};

		match outcome {
			Ok(outcome) => match &*outcome {
				AnalyzerOutcome::Success(body) => Ok(body.clone()),
				AnalyzerOutcome::Failure(message) => Err(AnalyzerClientError::RequestFailed(message.clone())),
			},
			Err(AwaitedResponseError::Cancelled) => {
				self.pending.write().await.remove(&seq);

				Err(AnalyzerClientError::Cancelled)
			}
			Err(AwaitedResponseError::Transport) => Err(AnalyzerClientError::Transport),
		}
	}

	/// Sends `command` to the analyzer without waiting for (or correlating) a response.
	pub(crate) async fn notify(&self, command: &str, arguments: Option<Value>) -> Result<(), AnalyzerClientError> {
		let seq = self.next_seq();

		self.outgoing
			.send(OutgoingMessage::new(seq, command, arguments))
			.await
			.map_err(|_| AnalyzerClientError::Transport)
	}

	/// Sends a `close` notification for each open file, then kills the subprocess if it has not
	/// exited within a grace window, failing any requests still pending.
	pub(crate) async fn stop(&self, open_file_paths: impl Iterator<Item = String>) {
		for file in open_file_paths {
			let _ = self.notify("close", Some(serde_json::json!({ "file": file }))).await;
		}

		self.outgoing.close();

		let mut child_slot = self.child.lock().await;

		if let Some(mut child) = child_slot.take() {
			let exited = tokio::time::timeout(Duration::from_secs(2), child.wait()).await;

			if exited.is_err() {
				let _ = child.kill().await;
			}
		}

		Self::fail_all_pending(&self.pending).await;
	}
}

async fn race_with_cancellation(
	slot: &Arc<PendingSlot>,
	cancel_token: Arc<CancellationToken>,
) -> Result<Arc<AnalyzerOutcome>, AwaitedResponseError> {
	tokio::select! {
		outcome = slot.future() => outcome,
		_ = poll_until_canceled(cancel_token) => {
			let _ = slot.set_err(AwaitedResponseError::Cancelled);

			slot.future().await
		}
	}
}

async fn poll_until_canceled(cancel_token: Arc<CancellationToken>) {
	while !cancel_token.is_canceled() {
		tokio::time::sleep(Duration::from_millis(25)).await;
	}
}

/// Reads one `Content-Length: N\r\n\r\n<N bytes of JSON>` frame. Returns `Ok(None)` on a clean EOF.
async fn read_framed_message<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> std::io::Result<Option<IncomingMessage>> {
	let mut content_length: Option<usize> = None;

	loop {
		let mut header_line = String::new();

		if reader.read_line(&mut header_line).await? == 0 {
			return Ok(None);
		}

		let header_line = header_line.trim_end();

		if header_line.is_empty() {
			break;
		}

		if let Some(value) = header_line.strip_prefix("Content-Length:") {
			content_length = value.trim().parse::<usize>().ok();
		}
	}

	let Some(content_length) = content_length else {
		return Ok(None);
	};

	let mut body = vec![0u8; content_length];

	reader.read_exact(&mut body).await?;

	Ok(serde_json::from_slice(&body).ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn diagnostic_kind_recognizes_the_three_event_names() {
		assert_eq!(DiagnosticKind::from_event_name("semanticDiag"), Some(DiagnosticKind::Semantic));
		assert_eq!(DiagnosticKind::from_event_name("syntaxDiag"), Some(DiagnosticKind::Syntactic));
		assert_eq!(DiagnosticKind::from_event_name("suggestionDiag"), Some(DiagnosticKind::Suggestion));
		assert_eq!(DiagnosticKind::from_event_name("telemetry"), None);
	}
}
