//! Server configuration (ambient, §3/§10), populated once from parsed CLI flags and threaded into
//! the command.

use std::path::PathBuf;

/// An explicit override for the analyzer executable, its own logging, and this server's own
/// developer-facing logging — everything the CLI can configure before the server starts.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub tsserver_path: Option<PathBuf>,
	pub tsserver_log_file: Option<PathBuf>,
	pub tsserver_log_verbosity: Option<String>,
}
