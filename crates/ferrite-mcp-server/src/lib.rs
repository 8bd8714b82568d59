//! The server role: tool, resource, and prompt registries dispatched to
//! from a [`ferrite_mcp_protocol::Peer`]. Registering a handler compiles its
//! schema (tools) or just stores it (resources, prompts); [`ServerBuilder`]
//! wires the resulting [`McpServer`] to a transport connection.

mod error;
mod handlers;
mod pagination;
mod registry;
mod server;

pub use error::{ServerError, ServerResult};
pub use handlers::{PromptHandler, ResourceHandler, ToolHandler};
pub use pagination::{decode_cursor, encode_cursor, paginate, DEFAULT_PAGE_SIZE};
pub use registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
pub use server::{McpServer, ServerBuilder, PROTOCOL_VERSION};
