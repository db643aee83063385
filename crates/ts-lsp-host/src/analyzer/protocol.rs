//! Wire shapes for the analyzer's native JSON command protocol (tsserver-style): 1-based
//! `(line, offset)` coordinates, `camelCase` field names, and a request/response/event envelope
//! keyed by `seq`/`request_seq`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A 1-based `(line, offset)` coordinate pair, as used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AnalyzerPosition {
	pub line: i64,
	pub offset: i64,
}

impl AnalyzerPosition {
	/// A sentinel meaning "end of file" on the analyzer side.
	pub(crate) const END_OF_FILE: AnalyzerPosition = AnalyzerPosition { line: i32::MAX as i64, offset: i32::MAX as i64 };
}

/// A `{start, end}` span in analyzer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AnalyzerRange {
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
}

/// One `{newText, start, end}` text substitution, as returned in `codeEdits`/refactor results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct AnalyzerTextChange {
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
	#[serde(rename = "newText")]
	pub new_text: String,
}

/// One completion candidate as returned by a `completions` request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct CompletionEntry {
	pub name: String,
	pub kind: String,
	#[serde(rename = "sortText")]
	pub sort_text: String,
	#[serde(rename = "insertText", skip_serializing_if = "Option::is_none")]
	pub insert_text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

/// One JSDoc tag (`@param x the input`, etc.) attached to a symbol's documentation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct JsDocTag {
	pub name: String,
	pub text: Option<String>,
}

/// One diagnostic as reported by a `semanticDiag`/`syntaxDiag`/`suggestionDiag` event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct AnalyzerDiagnostic {
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
	pub text: String,
	pub category: String,
	pub code: Option<i64>,
}

/// The body of a `*Diag` event: the file the diagnostics belong to and the full replacement list
/// for that (file, kind) pair.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiagnosticEventBody {
	pub file: String,
	pub diagnostics: Vec<AnalyzerDiagnostic>,
}

/// An outgoing message to the analyzer: either a `request` (expects a matching response) or an
/// `event`-less `request` used fire-and-forget (a "notification" in analyzer parlance is just a
/// request whose response nobody awaits).
#[derive(Debug, Clone, Serialize)]
pub(crate) struct OutgoingMessage {
	pub seq: i64,
	#[serde(rename = "type")]
	pub kind: &'static str,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub arguments: Option<Value>,
}

impl OutgoingMessage {
	pub(crate) fn new(seq: i64, command: impl Into<String>, arguments: Option<Value>) -> Self {
		Self { seq, kind: "request", command: command.into(), arguments }
	}
}

/// One match from a `definition`/`implementation`/`typeDefinition`/`references` request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DefinitionEntry {
	pub file: String,
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
}

/// A `references` response entry, which additionally carries the enclosing line text.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReferenceEntry {
	pub file: String,
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
	#[serde(rename = "isWriteAccess", default)]
	pub is_write_access: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReferencesResponse {
	pub refs: Vec<ReferenceEntry>,
}

/// One node of the `navtree` response (§4.5): recursively flattened into `SymbolInformation`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NavigationTree {
	pub text: String,
	pub kind: String,
	#[serde(rename = "spans")]
	pub spans: Vec<AnalyzerRange>,
	#[serde(default)]
	pub child_items: Vec<NavigationTree>,
}

/// One match from a `navto` (workspace-symbol) request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NavtoItem {
	pub name: String,
	pub kind: String,
	pub file: String,
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
	#[serde(rename = "containerName", default)]
	pub container_name: Option<String>,
}

/// The body of a `quickinfo` (hover) response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct QuickInfoResponse {
	#[serde(rename = "displayString")]
	pub display_string: String,
	#[serde(default)]
	pub documentation: String,
	#[serde(default)]
	pub tags: Vec<JsDocTag>,
	pub start: AnalyzerPosition,
	pub end: AnalyzerPosition,
}

/// The body of a `rename` response's `info` field.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RenameInfo {
	#[serde(rename = "canRename")]
	pub can_rename: bool,
	#[serde(rename = "localeErrorMessage", default)]
	pub locale_error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RenameFileLocations {
	pub file: String,
	pub locs: Vec<AnalyzerRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RenameResponse {
	pub info: RenameInfo,
	#[serde(default)]
	pub locs: Vec<RenameFileLocations>,
}

/// One outlining span from an `outliningSpans` request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutliningSpan {
	#[serde(rename = "textSpan")]
	pub text_span: AnalyzerRange,
	pub kind: String,
}

/// One file's worth of edits, as returned by `getCodeFixes`/`getApplicableRefactors`/`organizeImports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileCodeEdits {
	#[serde(rename = "fileName")]
	pub file_name: String,
	#[serde(rename = "textChanges")]
	pub text_changes: Vec<AnalyzerTextChange>,
}

/// One quick-fix action, as returned by `getCodeFixes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CodeFixAction {
	pub description: String,
	pub changes: Vec<FileCodeEdits>,
	#[serde(rename = "fixName", default)]
	pub fix_name: Option<String>,
	#[serde(rename = "commands", default)]
	pub commands: Vec<Value>,
}

/// One action within a refactor group, as returned by `getApplicableRefactors`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefactorActionInfo {
	pub name: String,
	pub description: String,
}

/// One refactor group (a named family of related actions), as returned by `getApplicableRefactors`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApplicableRefactorInfo {
	pub name: String,
	pub description: String,
	pub actions: Vec<RefactorActionInfo>,
}

/// The body of a `getEditsForRefactor` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RefactorEditInfo {
	pub edits: Vec<FileCodeEdits>,
	#[serde(rename = "renameLocation", default)]
	pub rename_location: Option<AnalyzerPosition>,
	#[serde(rename = "renameFilename", default)]
	pub rename_filename: Option<String>,
}

/// One fragment of syntax-highlighted display text, as used in `completionEntryDetails` and
/// `signatureHelp` responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SymbolDisplayPart {
	pub text: String,
}

/// The body of a `completionEntryDetails` response for one requested entry.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CompletionEntryDetails {
	#[serde(rename = "displayParts", default)]
	pub display_parts: Vec<SymbolDisplayPart>,
	#[serde(default)]
	pub documentation: Vec<SymbolDisplayPart>,
	#[serde(default)]
	pub tags: Vec<JsDocTag>,
	#[serde(rename = "codeActions", default)]
	pub code_actions: Vec<CodeFixAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignatureHelpParameter {
	#[serde(rename = "displayParts", default)]
	pub display_parts: Vec<SymbolDisplayPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignatureHelpItem {
	#[serde(rename = "prefixDisplayParts", default)]
	pub prefix_display_parts: Vec<SymbolDisplayPart>,
	#[serde(rename = "suffixDisplayParts", default)]
	pub suffix_display_parts: Vec<SymbolDisplayPart>,
	#[serde(default)]
	pub parameters: Vec<SignatureHelpParameter>,
	#[serde(default)]
	pub documentation: Vec<SymbolDisplayPart>,
}

/// The body of a `signatureHelp` response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignatureHelpItems {
	pub items: Vec<SignatureHelpItem>,
	#[serde(rename = "selectedItemIndex", default)]
	pub selected_item_index: u32,
	#[serde(rename = "argumentIndex", default)]
	pub argument_index: u32,
}

/// An incoming message from the analyzer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum IncomingMessage {
	#[serde(rename = "response")]
	Response {
		request_seq: i64,
		success: bool,
		#[serde(default)]
		body: Option<Value>,
		#[serde(default)]
		message: Option<String>,
	},
	#[serde(rename = "event")]
	Event {
		event: String,
		#[serde(default)]
		body: Option<Value>,
	},
}
