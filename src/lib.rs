//! Grasshopper - AST-aware AI code completion language server
//!
//! Tracks open documents and their tree-sitter trees, extracts a bounded
//! context window around the cursor and asks a pluggable backend for the
//! code that belongs there.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod models;
pub mod server;
pub mod services;

pub use error::{GrasshopperError, GrasshopperResult};
