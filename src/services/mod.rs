//! Service layer for Grasshopper

pub mod backend;
pub mod completion;
pub mod config;
pub mod context;
pub mod documents;

pub use backend::{CompletionBackend, build_backend};
pub use completion::CompletionService;
pub use config::{ConfigService, DefaultConfigService};
pub use context::ContextExtractor;
pub use documents::{DocumentSnapshot, DocumentStore};
