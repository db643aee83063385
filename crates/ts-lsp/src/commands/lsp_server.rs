use crate::cli::flags::Server;
use crate::stdio::ConsoleDriver;
use crate::{Command, CommandInvocationError};
use ts_lsp_abstractions::tracing::subscriber;
use ts_lsp_host::tracing::{
	tracing_subscriber::{fmt::layer, prelude::*, Registry},
	LspTracingLayer,
};
use ts_lsp_host::{config::ServerConfig, LspHost};
use async_trait::async_trait;
use cancellation::CancellationToken;
use std::sync::Arc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// A command that starts the Language Server Protocol (LSP) server implementation.
pub struct LspServerCommand {
	config: Server,
}

impl LspServerCommand {
	/// Initializes a new [`LspServerCommand`] instance.
	pub fn new(config: Server) -> Self {
		LspServerCommand { config }
	}
}

#[async_trait]
impl Command for LspServerCommand {
	/// Runs the command by connecting an [`LspHost`] to the process's `stdio`.
	async fn run(&self, cancel_token: Arc<CancellationToken>) -> Result<(), CommandInvocationError> {
		let console = ConsoleDriver::new();
		let trace_appender = RollingFileAppender::new(Rotation::NEVER, ".", "ts-lsp.log");
		let (non_blocking, _guard) = tracing_appender::non_blocking(trace_appender);
		let layer = layer().with_writer(non_blocking);
		let tracing_layer = LspTracingLayer::new(console.get_message_channel());
		let trace_value = tracing_layer.trace_value();

		let subscriber = Registry::default().with(layer).with(tracing_layer);

		subscriber::set_global_default(subscriber)
			.expect("Unable to set global tracing subscriber.");

		let server_config = ServerConfig {
			tsserver_path: self.config.tsserver_path.clone(),
			tsserver_log_file: self.config.tsserver_log_file.clone(),
			tsserver_log_verbosity: self.config.tsserver_log_verbosity.clone(),
		};

		let host = LspHost::new(console.get_message_channel(), Some(trace_value), server_config);

		match tokio::join!(host.start(cancel_token.clone()), console.start(cancel_token)) {
			(Ok(_), Ok(_)) => Ok(()),
			_ => Err(CommandInvocationError::Cancelled),
		}
	}
}
