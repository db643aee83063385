// Re-export the Language Server Protocol types so downstream crates depend on a single,
// pinned version without naming it directly.
pub use async_trait;
pub use lsp_types;
pub use tracing;

pub mod futures_extensions;

use std::{future::Future, pin::Pin};

/// A boxed, owned, thread-safe future. Used at trait object boundaries where `impl Future`
/// cannot be named (dispatch targets, transport callbacks).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A sink for developer-facing log output, implemented by whatever process hosts the server
/// (usually a `stdio` console driver before the `tracing` subscriber is installed).
pub trait Logger {
	fn log_message(&self, msg: &str);

	fn log_error(&self, msg: &str);
}

pub type LoggerImpl = dyn Logger + Send + Sync;
