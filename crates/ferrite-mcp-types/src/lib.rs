//! Domain types shared by every MCP role: tools, resources, prompts,
//! capability sets, content blocks, and the sampling/roots/elicitation
//! payloads the client role exposes back to a server.
//!
//! These types model JSON shapes defined by the MCP specification. They are
//! deliberately permissive about unknown fields (`#[serde(flatten)]` into an
//! `extra` map) since peers on either side may be running a newer protocol
//! revision.

mod capabilities;
mod content;
mod elicitation;
mod initialization;
mod prompts;
mod resources;
mod roots;
mod sampling;
mod tools;

pub use capabilities::{ClientCapabilities, RootsCapability, ServerCapabilities};
pub use content::Content;
pub use elicitation::{ElicitRequestedSchema, ElicitResult, ElicitationAction};
pub use initialization::{Implementation, InitializeParams, InitializeResult};
pub use prompts::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
pub use resources::{Resource, ResourceContents, ResourceTemplate};
pub use roots::Root;
pub use sampling::{CreateMessageParams, CreateMessageResult, ModelPreferences, SamplingMessage};
pub use tools::{CallToolResult, Tool, ToolAnnotations};

/// Opaque, server-issued pagination cursor. Clients must treat this as an
/// uninterpreted token and pass it back verbatim on the next `*/list` call.
pub type Cursor = String;

/// A page of list results plus an optional cursor for the next page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Page<T> {
    #[serde(flatten)]
    pub items: T,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}
