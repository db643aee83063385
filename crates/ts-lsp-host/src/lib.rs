mod analyzer;
mod diagnostics;
mod document;
mod fsm;
mod lsp;
mod lsp_impl;
mod translation;
pub mod config;
pub mod json_rpc;
pub mod tracing;

use std::sync::Arc;
use ts_lsp_abstractions::{tracing::*};
use async_channel::{Receiver, Sender};
use cancellation::{CancellationToken, OperationCanceled};
use config::ServerConfig;
use fsm::LspProtocolMachine;
use json_rpc::message::Message;
use lsp::request::RequestManager;
use tracing::TraceValueAccessor;

/// A tuple type that represents both a sender and a receiver of [`Message`] instances.
pub type MessageChannel = (Sender<Message>, Receiver<Message>);

/// Provides a runtime environment for the TypeScript LSP server, utilizing services that are provided by the host process.
pub struct LspHost {
	sender: Sender<Message>,
	receiver: Receiver<Message>,
	trace_value: Option<TraceValueAccessor>,
	config: ServerConfig,
}

impl LspHost {
	/// Initializes a new [`LspHost`] instance with a [`MessageChannel`] to send and receive Language Server Protocol (LSP)
	/// messages over, an optional [`TraceValueAccessor`] that can be used to set the LSP tracing value, and the
	/// [`ServerConfig`] parsed from the command line.
	///
	/// If available, `trace_value` will be used on receipt of a `'$/setTrace'` notification from the LSP client to set
	/// the required logging level.
	pub fn new(request_channel: MessageChannel, trace_value: Option<TraceValueAccessor>, config: ServerConfig) -> Self {
		let (sender, receiver) = request_channel;

		LspHost {
			sender,
			receiver,
			trace_value,
			config,
		}
	}

	/// Starts executing the the [`LspHost`] instance.
	///
	/// Once started, request messages will be received through the message channel, forwarded for processing to the internal
	/// state machine, with response messages sent back through the message channel for the client to process. Incoming
	/// `Response` messages (replies to requests the server itself sent to the client) are instead routed to an internal
	/// [`RequestManager`] that correlates them with their original request.
	pub async fn start(&self, cancel_token: Arc<CancellationToken>) -> Result<(), OperationCanceled> {
		info!("LspHost is starting.");

		let (response_sender, response_receiver) = async_channel::unbounded();
		let request_manager = RequestManager::new((self.sender.clone(), response_receiver));

		let request_manager_task = {
			let request_manager = request_manager.clone();
			let cancel_token = cancel_token.clone();

			tokio::spawn(async move {
				let _ = request_manager.start(cancel_token).await;
			})
		};

		let mut protocol_machine = LspProtocolMachine::new(request_manager, self.config.clone(), self.trace_value.clone());

		while protocol_machine.is_active() && !cancel_token.is_canceled() {
			let request_message = self.receiver.recv().await;

			if cancel_token.is_canceled() {
				break;
			}

			match request_message {
				Ok(message) => {
					if let Message::Response(_) = &message {
						if response_sender.send(message).await.is_err() {
							error!("Failed to forward Response message to the RequestManager.");
						}

						continue;
					}

					let request_message_span = info_span!("[Message]", message = format!("{}", message));

					async {
						match protocol_machine.process_message(&message).await {
							Ok(response_message) => {
								if let Some(Message::Response(_)) = &response_message {
									self.sender.send(response_message.unwrap()).await.unwrap();
								}
							}
							Err(err) => {
								error!("Protocol Error: {}", &err.to_string());
							}
						}
					}
					.instrument(request_message_span)
					.await;
				}
				Err(err) => {
					error!("Unexpected error receving request: {:?}", err);

					continue
				},
			}
		}

		info!("LspHost is stopping.");

		request_manager_task.abort();

		if protocol_machine.is_active() {
			return Err(OperationCanceled);
		}

		Ok(())
	}
}
