use crate::error::ServerResult;
use async_trait::async_trait;
use ferrite_mcp_core::RequestContext;
use ferrite_mcp_types::{CallToolResult, GetPromptResult, Prompt, Resource, ResourceContents, Tool};
use serde_json::Value;
use std::collections::HashMap;

/// Services one `tools/call` invocation for a single tool name.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: RequestContext, arguments: Option<Value>) -> ServerResult<CallToolResult>;

    /// The `Tool` advertised in `tools/list`. Its `inputSchema` is compiled
    /// once at registration time and re-used to validate every call.
    fn definition(&self) -> Tool;
}

/// Serves the contents of one resource (or one member of a resource
/// template family — `uri` is the concrete, already-expanded URI either
/// way).
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, ctx: RequestContext, uri: &str) -> ServerResult<Vec<ResourceContents>>;

    fn definition(&self) -> Resource;
}

/// Renders one named prompt with caller-supplied arguments.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(
        &self,
        ctx: RequestContext,
        arguments: Option<HashMap<String, String>>,
    ) -> ServerResult<GetPromptResult>;

    fn definition(&self) -> Prompt;
}
