//! Context Extractor
//!
//! Builds the bounded prompt context around a cursor: byte windows before and
//! after the current line, the current line split at the cursor, the cursor
//! node, the nearest enclosing declaration and the file's imports.

use std::collections::HashSet;

use tree_sitter::{Node, Tree};

use crate::config::RuntimeConfig;
use crate::infra::ast::node_types::{LanguageNodeKinds, node_kinds};
use crate::infra::position::{ceil_char_boundary, floor_char_boundary};
use crate::models::context::{ContextInfo, NodeInfo};

/// The document a context is extracted from
#[derive(Debug, Clone, Copy)]
pub struct SourceView<'a> {
    pub text: &'a str,
    /// `None` for unsupported languages or failed parses
    pub tree: Option<&'a Tree>,
    pub language_id: &'a str,
    pub filename: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextExtractor {
    prefix_bytes: usize,
    suffix_bytes: usize,
}

impl Default for ContextExtractor {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for ContextExtractor {
    fn from(config: &RuntimeConfig) -> Self {
        Self::new(config.prefix_bytes, config.suffix_bytes)
    }
}

impl ContextExtractor {
    pub fn new(prefix_bytes: usize, suffix_bytes: usize) -> Self {
        Self {
            prefix_bytes,
            suffix_bytes,
        }
    }

    /// Extract context at byte `offset`.
    ///
    /// `cursor_node` is reused when the caller already looked it up.
    pub fn extract(
        &self,
        source: &SourceView<'_>,
        offset: usize,
        cursor_node: Option<Node<'_>>,
    ) -> ContextInfo {
        let text = source.text;
        let bytes = text.as_bytes();
        let offset = floor_char_boundary(text, offset);

        let line_start = bytes[..offset]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |newline| newline + 1);
        let line_end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(text.len(), |newline| offset + newline);
        // CRLF: the `\r` belongs to the line break, not the line
        let content_end = if line_end > offset && bytes[line_end - 1] == b'\r' {
            line_end - 1
        } else {
            line_end
        };

        let prefix_start = ceil_char_boundary(text, line_start.saturating_sub(self.prefix_bytes));
        let suffix_start = if line_end < text.len() {
            line_end + 1
        } else {
            line_end
        };
        let suffix_end = floor_char_boundary(
            text,
            suffix_start.saturating_add(self.suffix_bytes).min(text.len()),
        );

        let mut info = ContextInfo {
            language_id: source.language_id.to_string(),
            filename: source.filename.to_string(),
            prefix: text[prefix_start..line_start].to_string(),
            suffix: text[suffix_start..suffix_end].to_string(),
            current_line_prefix: text[line_start..offset].to_string(),
            current_line_suffix: text[offset..content_end].to_string(),
            ..Default::default()
        };

        let Some(tree) = source.tree else {
            tracing::debug!(
                "Text-only context for {} (prefix={}, suffix={})",
                source.filename,
                info.prefix.len(),
                info.suffix.len()
            );
            return info;
        };

        let root = tree.root_node();
        let cursor_node = cursor_node.or_else(|| node_at_cursor(root, offset));
        info.cursor_node = cursor_node.map(|node| NodeInfo::from_node(node, text));

        if let Some(kinds) = node_kinds(source.language_id) {
            info.enclosing_node = cursor_node
                .and_then(|node| find_enclosing(node, kinds))
                .map(|node| NodeInfo::from_node(node, text));
            info.imports = collect_imports(root, text, kinds);
        }

        tracing::debug!(
            "Context for {}: cursor={}, enclosing={}, prefix={}, suffix={}, imports={}",
            source.filename,
            info.cursor_node.as_ref().map_or("none", |n| n.kind.as_str()),
            info.enclosing_node
                .as_ref()
                .map_or("none", |n| n.kind.as_str()),
            info.prefix.len(),
            info.suffix.len(),
            info.imports.len()
        );

        info
    }
}

/// Smallest named node at the cursor, including one that ends right at it
///
/// A byte-range lookup of `(offset, offset)` skips nodes ending at `offset`,
/// which is where the cursor sits after typing a word.
pub fn node_at_cursor(root: Node<'_>, offset: usize) -> Option<Node<'_>> {
    if offset > 0
        && let Some(before) = root.named_descendant_for_byte_range(offset - 1, offset)
        && before.end_byte() == offset
    {
        return Some(before);
    }
    root.named_descendant_for_byte_range(offset, offset)
}

/// First node, starting at `node` itself, whose kind is function- or type-like
fn find_enclosing<'t>(node: Node<'t>, kinds: &LanguageNodeKinds) -> Option<Node<'t>> {
    let mut current = Some(node);
    while let Some(node) = current {
        if kinds.is_enclosing(node.kind()) {
            return Some(node);
        }
        current = node.parent();
    }
    None
}

/// Cleaned import texts in first-seen order, without duplicates
fn collect_imports(root: Node<'_>, text: &str, kinds: &LanguageNodeKinds) -> Vec<String> {
    let mut imports = Vec::new();
    if kinds.imports.is_empty() {
        return imports;
    }

    let mut seen = HashSet::new();
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        let is_import = kinds.is_import(node.kind());
        if is_import
            && let Some(raw) = text.get(node.start_byte()..node.end_byte())
            && let Some(cleaned) = kinds.import_cleanup.apply(raw)
            && seen.insert(cleaned.clone())
        {
            imports.push(cleaned);
        }

        // Import nodes are not searched for nested imports
        if !is_import && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return imports;
            }
        }
    }
}
