//! LSP domain types
//!
//! Parameter and result shapes for the methods Grasshopper serves. JSON-RPC
//! envelope types live in `infra::lsp::protocol`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Zero-based position; `character` counts UTF-16 code units.
///
/// Signed so that out-of-contract negative input reaches the translator and is
/// rejected there instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: i64,
    pub character: i64,
}

impl Position {
    pub fn new(line: i64, character: i64) -> Self {
        Self { line, character }
    }
}

// ============================================================================
// Text Document Synchronization
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidOpenTextDocumentParams {
    pub text_document: TextDocumentItem,
}

/// With full synchronization every change event carries the whole document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Value>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeTextDocumentParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidSaveTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidCloseTextDocumentParams {
    pub text_document: TextDocumentIdentifier,
}

// ============================================================================
// Completion
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub trigger_kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_character: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CompletionContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCompletionParams {
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CompletionItemKind {
    Text = 1,
    Snippet = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum InsertTextFormat {
    PlainText = 1,
    Snippet = 2,
}

impl InsertTextFormat {
    /// Snippet only when the text could contain tab stops or placeholders
    pub fn detect(text: &str) -> Self {
        if text.contains(['$', '{', '}']) {
            Self::Snippet
        } else {
            Self::PlainText
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<CompletionItemKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_text_format: Option<InsertTextFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionList {
    pub is_incomplete: bool,
    pub items: Vec<CompletionItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCompletionItem {
    pub insert_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineCompletionList {
    pub items: Vec<InlineCompletionItem>,
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub process_id: Option<u32>,
    #[serde(default)]
    pub root_uri: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
    #[serde(default)]
    pub capabilities: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum TextDocumentSyncKind {
    None = 0,
    Full = 1,
    Incremental = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDocumentSyncOptions {
    pub open_close: bool,
    pub change: TextDocumentSyncKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub resolve_provider: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InlineCompletionOptions {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub text_document_sync: TextDocumentSyncOptions,
    pub completion_provider: CompletionOptions,
    pub inline_completion_provider: InlineCompletionOptions,
}

impl ServerCapabilities {
    /// Full-document sync, completion without resolve, inline completion
    pub fn grasshopper() -> Self {
        Self {
            text_document_sync: TextDocumentSyncOptions {
                open_close: true,
                change: TextDocumentSyncKind::Full,
            },
            completion_provider: CompletionOptions {
                resolve_provider: false,
            },
            inline_completion_provider: InlineCompletionOptions {},
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MessageType {
    Error = 1,
    Warning = 2,
    Info = 3,
    Log = 4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessageParams {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_shape() {
        let json = serde_json::to_value(ServerCapabilities::grasshopper()).unwrap();
        assert_eq!(json["textDocumentSync"]["openClose"], true);
        assert_eq!(json["textDocumentSync"]["change"], 1);
        assert_eq!(json["completionProvider"]["resolveProvider"], false);
        assert!(json["inlineCompletionProvider"].is_object());
    }

    #[test]
    fn test_completion_item_numeric_enums() {
        let item = CompletionItem {
            label: "Println()".into(),
            kind: Some(CompletionItemKind::Snippet),
            detail: None,
            insert_text: Some("Println()".into()),
            insert_text_format: Some(InsertTextFormat::PlainText),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], 15);
        assert_eq!(json["insertTextFormat"], 1);
        assert_eq!(json["insertText"], "Println()");
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn test_insert_text_format_detection() {
        assert_eq!(
            InsertTextFormat::detect("fmt.Println(x)"),
            InsertTextFormat::PlainText
        );
        assert_eq!(
            InsertTextFormat::detect("if err != nil { return err }"),
            InsertTextFormat::Snippet
        );
        assert_eq!(
            InsertTextFormat::detect("echo $HOME"),
            InsertTextFormat::Snippet
        );
    }

    #[test]
    fn test_did_change_params() {
        let params: DidChangeTextDocumentParams = serde_json::from_value(serde_json::json!({
            "textDocument": {"uri": "file:///a.go", "version": 3},
            "contentChanges": [{"text": "package a"}, {"text": "package b"}]
        }))
        .unwrap();
        assert_eq!(params.text_document.version, 3);
        assert_eq!(params.content_changes.len(), 2);
        assert_eq!(params.content_changes[1].text, "package b");
    }

    #[test]
    fn test_negative_position_deserializes() {
        let pos: Position =
            serde_json::from_value(serde_json::json!({"line": -1, "character": 0})).unwrap();
        assert_eq!(pos.line, -1);
    }

    #[test]
    fn test_empty_lists_serialize() {
        let json = serde_json::to_value(CompletionList::default()).unwrap();
        assert_eq!(json, serde_json::json!({"isIncomplete": false, "items": []}));

        let json = serde_json::to_value(InlineCompletionList::default()).unwrap();
        assert_eq!(json, serde_json::json!({"items": []}));
    }
}
