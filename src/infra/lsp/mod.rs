//! LSP Infrastructure for Grasshopper
//!
//! - JSON-RPC 2.0 envelope types and error codes
//! - Content-Length framed reader and a shared frame writer

pub mod protocol;
pub mod transport;

pub use protocol::{Message, Notification, Request, RequestId, Response, RpcError};
pub use transport::{Frame, MessageReader, MessageWriter};
