//! Infrastructure layer for Grasshopper
//!
//! Wire protocol, syntax parsing and position arithmetic.

pub mod ast;
pub mod lsp;
pub mod position;
