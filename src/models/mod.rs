//! Data models for Grasshopper

pub mod config;
pub mod context;
pub mod lsp;

pub use config::GrasshopperConfig;
pub use context::{ContextInfo, NodeInfo};
pub use lsp::Position;
