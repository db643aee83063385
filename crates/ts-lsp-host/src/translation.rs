//! Pure, stateless translation functions between LSP coordinates/entities and the analyzer's (C2).

use std::path::{Path, PathBuf};

use ts_lsp_abstractions::lsp_types::{
	CompletionItem, CompletionItemKind, Location, MarkupContent, MarkupKind, Position, Range, SymbolInformation,
	SymbolKind, TextEdit, Url, WorkspaceEdit,
};

use crate::analyzer::protocol::{
	AnalyzerPosition, AnalyzerRange, AnalyzerTextChange, CompletionEntry, DefinitionEntry, FileCodeEdits, JsDocTag,
	NavigationTree, NavtoItem,
};

/// Parses a `file://` URI into an absolute native path. Returns `None` for any other scheme.
pub(crate) fn uri_to_path(uri: &str) -> Option<PathBuf> {
	let rest = uri.strip_prefix("file://")?;
	let decoded = percent_decode(rest);

	Some(PathBuf::from(decoded))
}

/// Produces a `file://` URI for `path`, percent-encoding reserved characters per RFC 3986.
pub(crate) fn path_to_uri(path: &Path) -> String {
	let mut uri = String::from("file://");
	let path_str = path.to_string_lossy();

	if cfg!(windows) && !path_str.starts_with('/') { uri.push('/'); }

	for segment in path_str.replace('\\', "/").split('/') {
		if segment.is_empty() { continue; }

		uri.push('/');
		uri.push_str(&percent_encode(segment));
	}

	uri
}

fn percent_encode(segment: &str) -> String {
	let mut out = String::with_capacity(segment.len());

	for byte in segment.bytes() {
		match byte {
			b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b':' => out.push(byte as char),
			_ => out.push_str(&format!("%{:02X}", byte)),
		}
	}

	out
}

fn percent_decode(input: &str) -> String {
	let bytes = input.as_bytes();
	let mut out = Vec::with_capacity(bytes.len());
	let mut i = 0;

	while i < bytes.len() {
		if bytes[i] == b'%' && i + 2 < bytes.len() {
			if let Ok(value) = u8::from_str_radix(&input[i + 1..i + 3], 16) {
				out.push(value);
				i += 3;
				continue;
			}
		}

		out.push(bytes[i]);
		i += 1;
	}

	String::from_utf8_lossy(&out).into_owned()
}

/// Converts an LSP (0-based) `Position` to an analyzer (1-based) position.
pub(crate) fn position_to_analyzer(position: Position) -> AnalyzerPosition {
	AnalyzerPosition { line: position.line as i64 + 1, offset: position.character as i64 + 1 }
}

/// Converts an analyzer (1-based) position to an LSP (0-based) `Position`.
pub(crate) fn position_from_analyzer(position: &AnalyzerPosition) -> Position {
	Position::new((position.line - 1).max(0) as u32, (position.offset - 1).max(0) as u32)
}

/// Converts an LSP `Range` to an analyzer `{start, end}` range.
pub(crate) fn range_to_analyzer(range: Range) -> AnalyzerRange {
	AnalyzerRange { start: position_to_analyzer(range.start), end: position_to_analyzer(range.end) }
}

/// Converts an analyzer `{start, end}` range to an LSP `Range`.
pub(crate) fn range_from_analyzer(range: &AnalyzerRange) -> Range {
	Range::new(position_from_analyzer(&range.start), position_from_analyzer(&range.end))
}

/// Converts an analyzer text change (`{newText, start, end}`) into an LSP [`TextEdit`].
pub(crate) fn text_edit_from_analyzer(start: &AnalyzerPosition, end: &AnalyzerPosition, new_text: &str) -> TextEdit {
	TextEdit { range: Range::new(position_from_analyzer(start), position_from_analyzer(end)), new_text: new_text.into() }
}

/// Maps an analyzer symbol "kind" string to the LSP [`SymbolKind`] enumeration. Unknown kinds map
/// to [`SymbolKind::VARIABLE`].
pub(crate) fn symbol_kind_from_analyzer(kind: &str) -> SymbolKind {
	match kind {
		"class" => SymbolKind::CLASS,
		"interface" => SymbolKind::INTERFACE,
		"enum" => SymbolKind::ENUM,
		"method" => SymbolKind::METHOD,
		"property" => SymbolKind::PROPERTY,
		"function" => SymbolKind::FUNCTION,
		"var" | "let" => SymbolKind::VARIABLE,
		"const" => SymbolKind::CONSTANT,
		"constructor" => SymbolKind::CONSTRUCTOR,
		"module" => SymbolKind::MODULE,
		"alias" => SymbolKind::TYPE_PARAMETER,
		"type" => SymbolKind::STRUCT,
		"parameter" => SymbolKind::VARIABLE,
		_ => SymbolKind::VARIABLE,
	}
}

/// Renders a sequence of analyzer JSDoc tags as GitHub-flavored Markdown, one tag per line.
pub(crate) fn render_doc_tags(tags: &[JsDocTag]) -> String {
	tags
		.iter()
		.map(|tag| format!("*@{}* {}", tag.name, tag.text.as_deref().unwrap_or_default()))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Renders a `displayString` plus documentation/tags as Markdown hover content.
pub(crate) fn render_hover_markdown(display_string: &str, documentation: &str, tags: &[JsDocTag]) -> MarkupContent {
	let mut value = format!("```typescript\n{}\n```", display_string);

	if !documentation.is_empty() {
		value.push_str("\n\n");
		value.push_str(documentation);
	}

	let rendered_tags = render_doc_tags(tags);

	if !rendered_tags.is_empty() {
		value.push_str("\n\n");
		value.push_str(&rendered_tags);
	}

	MarkupContent { kind: MarkupKind::Markdown, value }
}

/// The opaque `data` payload attached to a completion item so that `completionItem/resolve` can
/// re-issue the analyzer query without re-deriving the originating request.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub(crate) struct CompletionItemData {
	pub uri: String,
	pub line: i64,
	pub offset: i64,
	pub entry_name: String,
	pub source: Option<String>,
}

/// Translates an analyzer completion entry into an LSP [`CompletionItem`].
pub(crate) fn completion_item_from_analyzer(entry: &CompletionEntry, uri: &str, position: Position) -> CompletionItem {
	let analyzer_position = position_to_analyzer(position);
	let data = CompletionItemData {
		uri: uri.to_string(),
		line: analyzer_position.line,
		offset: analyzer_position.offset,
		entry_name: entry.name.clone(),
		source: entry.source.clone(),
	};

	CompletionItem {
		label: entry.name.clone(),
		kind: Some(completion_item_kind_from_symbol_kind(symbol_kind_from_analyzer(&entry.kind))),
		sort_text: Some(entry.sort_text.clone()),
		insert_text: entry.insert_text.clone(),
		data: Some(serde_json::to_value(data).unwrap()),
		..Default::default()
	}
}

fn completion_item_kind_from_symbol_kind(kind: SymbolKind) -> CompletionItemKind {
	match kind {
		SymbolKind::CLASS => CompletionItemKind::CLASS,
		SymbolKind::INTERFACE => CompletionItemKind::INTERFACE,
		SymbolKind::ENUM => CompletionItemKind::ENUM,
		SymbolKind::METHOD => CompletionItemKind::METHOD,
		SymbolKind::PROPERTY => CompletionItemKind::PROPERTY,
		SymbolKind::FUNCTION => CompletionItemKind::FUNCTION,
		SymbolKind::CONSTANT => CompletionItemKind::CONSTANT,
		SymbolKind::CONSTRUCTOR => CompletionItemKind::CONSTRUCTOR,
		SymbolKind::MODULE => CompletionItemKind::MODULE,
		SymbolKind::STRUCT => CompletionItemKind::STRUCT,
		_ => CompletionItemKind::VARIABLE,
	}
}

/// Converts a list of analyzer `{start, end, newText}` edits for one file into per-URI LSP
/// [`TextEdit`]s.
pub(crate) fn text_edits_from_analyzer_changes(changes: &[AnalyzerTextChange]) -> Vec<TextEdit> {
	changes
		.iter()
		.map(|change| text_edit_from_analyzer(&change.start, &change.end, &change.new_text))
		.collect()
}

/// Converts a `definition`/`implementation`/`typeDefinition` match into an LSP [`Location`].
pub(crate) fn location_from_definition_entry(entry: &DefinitionEntry) -> Location {
	Location {
		uri: Url::parse(&path_to_uri(Path::new(&entry.file))).unwrap(),
		range: range_from_analyzer(&AnalyzerRange { start: entry.start, end: entry.end }),
	}
}

/// Recursively flattens a `navtree` response into [`SymbolInformation`] entries, threading the
/// containing element's `text` down as each child's `container_name` (§4.5).
pub(crate) fn flatten_navigation_tree(tree: &NavigationTree, uri: &Url, container_name: Option<&str>, out: &mut Vec<SymbolInformation>) {
	for span in &tree.spans {
		#[allow(deprecated)]
		out.push(SymbolInformation {
			name: tree.text.clone(),
			kind: symbol_kind_from_analyzer(&tree.kind),
			tags: None,
			deprecated: None,
			location: Location { uri: uri.clone(), range: range_from_analyzer(span) },
			container_name: container_name.map(str::to_string),
		});
	}

	for child in &tree.child_items {
		flatten_navigation_tree(child, uri, Some(&tree.text), out);
	}
}

/// Converts one `navto` (workspace-symbol) match into [`SymbolInformation`].
pub(crate) fn symbol_information_from_navto(item: &NavtoItem) -> SymbolInformation {
	#[allow(deprecated)]
	SymbolInformation {
		name: item.name.clone(),
		kind: symbol_kind_from_analyzer(&item.kind),
		tags: None,
		deprecated: None,
		location: location_from_definition_entry(&DefinitionEntry { file: item.file.clone(), start: item.start, end: item.end }),
		container_name: item.container_name.clone(),
	}
}

/// Converts a list of analyzer `{fileName, textChanges}` entries into an LSP [`WorkspaceEdit`],
/// grouping each file's edits under its `file://` URI.
pub(crate) fn workspace_edit_from_file_edits(edits: &[FileCodeEdits]) -> WorkspaceEdit {
	let mut changes = std::collections::HashMap::new();

	for edit in edits {
		let uri = Url::parse(&path_to_uri(Path::new(&edit.file_name))).unwrap();
		let text_edits = text_edits_from_analyzer_changes(&edit.text_changes);

		changes.insert(uri, text_edits);
	}

	WorkspaceEdit { changes: Some(changes), document_changes: None, change_annotations: None }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn uri_round_trips_through_path() {
		let uri = "file:///home/user/a%20b.ts";
		let path = uri_to_path(uri).unwrap();

		assert_eq!(path, PathBuf::from("/home/user/a b.ts"));
		assert_eq!(path_to_uri(&path), uri);
	}

	#[test]
	fn non_file_uri_returns_none() {
		assert_eq!(uri_to_path("untitled:Untitled-1"), None);
	}

	#[test]
	fn position_round_trips_analyzer_offset() {
		let position = Position::new(3, 7);
		let analyzer = position_to_analyzer(position);

		assert_eq!(analyzer, AnalyzerPosition { line: 4, offset: 8 });
		assert_eq!(position_from_analyzer(&analyzer), position);
	}

	#[test]
	fn unknown_symbol_kind_maps_to_variable() {
		assert_eq!(symbol_kind_from_analyzer("unknown-thing"), SymbolKind::VARIABLE);
	}

	#[test]
	fn renders_doc_tags_one_per_line() {
		let tags = vec![
			JsDocTag { name: "param".into(), text: Some("x the input".into()) },
			JsDocTag { name: "returns".into(), text: Some("the result".into()) },
		];

		assert_eq!(render_doc_tags(&tags), "*@param* x the input\n*@returns* the result");
	}
}
