//! Locates the analyzer executable (§6 discovery order): explicit path, workspace-local
//! `node_modules/.bin`, `PATH`, then a bundled fallback next to this binary.

use std::path::{Path, PathBuf};

/// The analyzer's executable name, with the platform-appropriate extension.
fn executable_name() -> &'static str {
	if cfg!(windows) { "tsserver.cmd" } else { "tsserver" }
}

/// Resolves the analyzer executable to launch.
///
/// Order: `explicit_path` (from `--tsserver-path`) → `<workspace_root>/node_modules/.bin/tsserver` →
/// `tsserver` resolved on `PATH` → a `node_modules/.bin/tsserver` bundled alongside this binary.
pub(crate) fn discover_analyzer_path(explicit_path: Option<&Path>, workspace_root: Option<&Path>) -> Option<PathBuf> {
	if let Some(path) = explicit_path {
		return Some(path.to_path_buf());
	}

	if let Some(root) = workspace_root {
		let candidate = root.join("node_modules").join(".bin").join(executable_name());

		if candidate.is_file() {
			return Some(candidate);
		}
	}

	if let Some(path) = find_on_path(executable_name()) {
		return Some(path);
	}

	bundled_fallback()
}

fn find_on_path(name: &str) -> Option<PathBuf> {
	let path_var = std::env::var_os("PATH")?;

	std::env::split_paths(&path_var).map(|dir| dir.join(name)).find(|candidate| candidate.is_file())
}

fn bundled_fallback() -> Option<PathBuf> {
	let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
	let candidate = exe_dir.join("node_modules").join(".bin").join(executable_name());

	candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_path_wins_regardless_of_existence() {
		let explicit = PathBuf::from("/some/explicit/tsserver");

		assert_eq!(discover_analyzer_path(Some(&explicit), None), Some(explicit));
	}
}
