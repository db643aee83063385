//! The open-document model (C1): an authoritative, in-memory snapshot of one open text buffer,
//! addressed in LSP's UTF-16, 0-based `(line, character)` coordinate space.

use ts_lsp_abstractions::lsp_types::{Position, Range};

/// The LSP `languageId` of an open document, narrowed to the four values the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Language {
	TypeScript,
	TypeScriptReact,
	JavaScript,
	JavaScriptReact,
	Other,
}

impl Language {
	pub(crate) fn from_language_id(language_id: &str) -> Self {
		match language_id {
			"typescript" => Language::TypeScript,
			"typescriptreact" => Language::TypeScriptReact,
			"javascript" => Language::JavaScript,
			"javascriptreact" => Language::JavaScriptReact,
			_ => Language::Other,
		}
	}

	/// The analyzer's `scriptKindName` value for this language, or `None` if the analyzer should
	/// infer it from the file extension.
	pub(crate) fn script_kind(&self) -> Option<&'static str> {
		match self {
			Language::TypeScript => Some("TS"),
			Language::TypeScriptReact => Some("TSX"),
			Language::JavaScript => Some("JS"),
			Language::JavaScriptReact => Some("JSX"),
			Language::Other => None,
		}
	}
}

/// An authoritative snapshot of one open text buffer.
#[derive(Debug, Clone)]
pub(crate) struct Document {
	uri: String,
	language: Language,
	version: i32,
	text: Vec<u16>,
	last_accessed: u64,
	line_offsets: Vec<u32>,
}

impl Document {
	/// Creates a new [`Document`] for an opened file.
	pub(crate) fn create(uri: String, language: Language, version: i32, text: &str, now: u64) -> Self {
		let text: Vec<u16> = text.encode_utf16().collect();
		let line_offsets = compute_line_offsets(&text);

		Self { uri, language, version, text, last_accessed: now, line_offsets }
	}

	pub(crate) fn uri(&self) -> &str { &self.uri }

	pub(crate) fn language(&self) -> Language { self.language }

	pub(crate) fn version(&self) -> i32 { self.version }

	pub(crate) fn last_accessed(&self) -> u64 { self.last_accessed }

	pub(crate) fn mark_accessed(&mut self, now: u64) { self.last_accessed = now; }

	/// Returns the full document text.
	pub(crate) fn get_text(&self) -> String { String::from_utf16_lossy(&self.text) }

	/// Returns the text within `range`, or the full text if `range` is `None`.
	pub(crate) fn get_text_range(&self, range: Option<Range>) -> String {
		match range {
			None => self.get_text(),
			Some(range) => {
				let start = self.offset_at(range.start);
				let end = self.offset_at(range.end);

				String::from_utf16_lossy(&self.text[start..end])
			}
		}
	}

	/// Applies a single incremental change, replacing `[range.start, range.end)` with `text` (or the
	/// entire document when `range` is `None`), and sets the new document `version`.
	pub(crate) fn apply_change(&mut self, range: Option<Range>, text: &str, version: i32) {
		let new_text: Vec<u16> = text.encode_utf16().collect();

		match range {
			None => self.text = new_text,
			Some(range) => {
				let start = self.offset_at(range.start);
				let end = self.offset_at(range.end);

				self.text.splice(start..end, new_text);
			}
		}

		self.line_offsets = compute_line_offsets(&self.text);
		self.version = version;
	}

	/// The number of lines in the document (always at least 1).
	pub(crate) fn line_count(&self) -> usize { self.line_offsets.len() }

	/// The text of a single line, excluding its line-break characters.
	pub(crate) fn line_text(&self, line: usize) -> String {
		let (start, end) = self.line_range(line);

		String::from_utf16_lossy(&self.text[start..end])
	}

	/// The `[start, end)` code-unit offset range for `line`, excluding the line's break characters.
	pub(crate) fn line_range(&self, line: usize) -> (usize, usize) {
		let start = self.line_offsets[line] as usize;
		let line_end = self.line_end_offset(line);

		(start, line_end)
	}

	/// Converts a 0-based `offset` into a code unit into an LSP `Position`.
	pub(crate) fn position_at(&self, offset: usize) -> Position {
		let offset = offset.min(self.text.len());
		let line = match self.line_offsets.binary_search(&(offset as u32)) {
			Ok(line) => line,
			Err(insertion_point) => insertion_point - 1,
		};

		let character = offset - self.line_offsets[line] as usize;

		Position::new(line as u32, character as u32)
	}

	/// Converts an LSP `Position` into a 0-based code-unit offset.
	pub(crate) fn offset_at(&self, position: Position) -> usize {
		let line = (position.line as usize).min(self.line_offsets.len() - 1);
		let line_start = self.line_offsets[line] as usize;
		let line_end = self.line_end_offset(line);

		(line_start + position.character as usize).min(line_end)
	}

	/// The offset one code unit before the start of `line + 1` — i.e. the exclusive end of `line`,
	/// not counting its line-break characters.
	fn line_end_offset(&self, line: usize) -> usize {
		let next_line_start = self
			.line_offsets
			.get(line + 1)
			.copied()
			.map(|offset| offset as usize)
			.unwrap_or(self.text.len());

		let mut end = next_line_start;

		// Walk back over the line break ('\n', or '\r\n', or a lone '\r') that precedes the next line.
		if end > (self.line_offsets[line] as usize) && self.text[end - 1] == u16::from(b'\n') {
			end -= 1;

			if end > (self.line_offsets[line] as usize) && self.text[end - 1] == u16::from(b'\r') {
				end -= 1;
			}
		}
		else if end > (self.line_offsets[line] as usize) && self.text[end - 1] == u16::from(b'\r') {
			end -= 1;
		}

		end
	}
}

/// Computes the 0-based line number to code-unit-offset index for `text`. Any of `\n`, `\r\n`, or a
/// lone `\r` counts as one line break; the break belongs to the preceding line. An empty trailing
/// line exists iff `text` ends with a break.
fn compute_line_offsets(text: &[u16]) -> Vec<u32> {
	let mut offsets = vec![0u32];
	let mut i = 0;

	while i < text.len() {
		match text[i] {
			0x0D => {
				// '\r' or '\r\n'.
				i += if text.get(i + 1) == Some(&0x0A) { 2 } else { 1 };
				offsets.push(i as u32);
			}
			0x0A => {
				i += 1;
				offsets.push(i as u32);
			}
			_ => i += 1,
		}
	}

	offsets
}

#[cfg(test)]
mod tests {
	use super::*;

	fn doc(text: &str) -> Document { Document::create("file:///a.ts".into(), Language::TypeScript, 1, text, 0) }

	#[test]
	fn offset_position_round_trip_for_every_offset() {
		let text = "function foo(){}\r\nfoo();\n\n";
		let document = doc(text);
		let len = text.encode_utf16().count();

		for offset in 0..=len {
			let position = document.position_at(offset);

			assert_eq!(document.offset_at(position), offset, "offset {} did not round-trip", offset);
		}
	}

	#[test]
	fn line_count_accounts_for_trailing_empty_line() {
		assert_eq!(doc("a\nb\n").line_count(), 3);
		assert_eq!(doc("a\nb").line_count(), 2);
		assert_eq!(doc("").line_count(), 1);
	}

	#[test]
	fn line_range_excludes_line_break() {
		let document = doc("abc\r\ndef");

		assert_eq!(document.line_text(0), "abc");
		assert_eq!(document.line_range(0), (0, 3));
	}

	#[test]
	fn apply_change_replaces_window_and_bumps_version() {
		let mut document = doc("function foo(){}\nfoo();\n");

		document.apply_change(Some(Range::new(Position::new(1, 0), Position::new(1, 3))), "foo", 2);

		assert_eq!(document.get_text(), "function foo(){}\nfoo();\n");
		assert_eq!(document.version(), 2);
	}

	#[test]
	fn apply_change_without_range_replaces_whole_document() {
		let mut document = doc("old");

		document.apply_change(None, "new text", 5);

		assert_eq!(document.get_text(), "new text");
		assert_eq!(document.version(), 5);
	}
}
