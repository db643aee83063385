use std::path::PathBuf;

xflags::xflags! {
	src "./src/cli/flags.rs"

	/// A Language Server Protocol (LSP) front-end that bridges an editor to an external
	/// TypeScript/JavaScript analyzer process.
	cmd ts-lsp {
		/// Optional path to a folder where a log file will be written.
		optional --logpath path: PathBuf

		/// Optional log level to apply when writing to the log file. Defaults to 'debug'.
		optional --loglevel level: String

		///  Displays the version number.
		optional -v,--version

		/// Starts executing the LSP server (default command).
		default cmd server {
			/// Use the 'stdio' transport (default).
			optional --stdio

			/// Explicit path to the analyzer (tsserver) executable. If omitted, the workspace's
			/// local install, then PATH, then a bundled fallback are tried in turn.
			optional --tsserver-path path: PathBuf

			/// Optional path to a file the analyzer process should write its own diagnostic log to.
			optional --tsserver-log-file path: PathBuf

			/// Optional verbosity passed through to the analyzer's own logging ('terse', 'normal',
			/// 'requesttime', or 'verbose').
			optional --tsserver-log-verbosity verbosity: String
		}
	}
}
// generated start
// The following code is generated by `xflags` macro.
// Run `env UPDATE_XFLAGS=1 cargo build` to regenerate.
#[derive(Debug)]
pub struct TsLsp {
    pub logpath: Option<PathBuf>,
    pub loglevel: Option<String>,
    pub version: bool,
    pub subcommand: TsLspCmd,
}

#[derive(Debug)]
pub enum TsLspCmd {
    Server(Server),
}

#[derive(Debug)]
pub struct Server {
    pub stdio: bool,
    pub tsserver_path: Option<PathBuf>,
    pub tsserver_log_file: Option<PathBuf>,
    pub tsserver_log_verbosity: Option<String>,
}

impl TsLsp {
    #[allow(dead_code)]
    pub fn from_env_or_exit() -> Self {
        Self::from_env_or_exit_()
    }

    #[allow(dead_code)]
    pub fn from_env() -> xflags::Result<Self> {
        Self::from_env_()
    }

    #[allow(dead_code)]
    pub fn from_vec(args: Vec<std::ffi::OsString>) -> xflags::Result<Self> {
        Self::from_vec_(args)
    }
}
// generated end
