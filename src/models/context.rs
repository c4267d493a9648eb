//! Prompt context extracted around the cursor

use serde::{Deserialize, Serialize};

/// A syntax node copied out of the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub kind: String,
    pub text: String,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl NodeInfo {
    pub fn from_node(node: tree_sitter::Node<'_>, source: &str) -> Self {
        let text = source
            .get(node.start_byte()..node.end_byte())
            .unwrap_or_default()
            .to_string();
        Self {
            kind: node.kind().to_string(),
            text,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }
}

/// Bounded view of a document around one cursor offset.
///
/// `prefix` ends where the current line starts, so `prefix` followed by
/// `current_line_prefix` is exactly the text before the cursor (up to the
/// prefix cap).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextInfo {
    pub language_id: String,
    pub filename: String,
    pub prefix: String,
    pub suffix: String,
    pub current_line_prefix: String,
    pub current_line_suffix: String,
    pub cursor_node: Option<NodeInfo>,
    pub enclosing_node: Option<NodeInfo>,
    pub imports: Vec<String>,
}
