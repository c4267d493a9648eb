//! AST parsing infrastructure for Grasshopper
//!
//! Tree-sitter parsers for 13 grammars plus per-language node-kind tables.

pub mod node_types;
pub mod parser;

pub use node_types::{LanguageNodeKinds, canonical_language_id, node_kinds};
pub use parser::{ParseService, TreeSitterParser};
