//! Shared primitives used by every other `ferrite-mcp-*` crate: the unified
//! error type, the per-request context (cancellation + progress + peer
//! metadata), and parsing for the `MCP_COMPAT` environment variable.

mod compat;
mod context;
mod error;

pub use compat::CompatFlags;
pub use context::RequestContext;
pub use error::{ErrorKind, McpError};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, McpError>;
