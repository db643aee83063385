use cancellation::CancellationToken;
use thiserror::Error;
use async_trait::async_trait;
use ts_lsp_host::tracing::tracing_subscriber::{registry::LookupSpan, Layer, Subscriber};

pub(crate) mod lsp_server;

 /// Defines a command invocation error.
#[derive(Error, Debug)]
pub enum CommandInvocationError {
	// The command was cancelled.
	#[error("The command was cancelled.")]
	Cancelled,

	/// An unexpected error.
	#[error("An unexpected error occurred executing the command.")]
	Unknown
}

/// A top-level command for the `ts-lsp` binary.
#[async_trait]
pub(crate) trait Command {
	/// Runs the command.
	async fn run(&self, cancel_token: std::sync::Arc<CancellationToken>) -> Result<(), CommandInvocationError>;

	/// Retrieves any additional `tracing` layers that this command wants installed on the global subscriber.
	///
	/// The default implementation installs none.
	fn logging_layers<S>(&self) -> Vec<Box<dyn Layer<S> + Send + Sync + 'static>>
	where
		S: Subscriber,
		for<'a> S: LookupSpan<'a>
	{
		Vec::new()
	}
}
