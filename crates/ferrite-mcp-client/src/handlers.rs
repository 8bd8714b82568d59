use async_trait::async_trait;
use ferrite_mcp_core::{McpError, RequestContext};
use ferrite_mcp_types::{CreateMessageParams, CreateMessageResult, ElicitRequestedSchema, ElicitResult, Root};

/// Answers a server-initiated `sampling/createMessage` request. Only a
/// client that owns a model connection installs one; a server advertising
/// `sampling` capability without this registered would have every such
/// request answered `MethodNotFound`, which is the correct behavior for a
/// client that never opted in.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        ctx: RequestContext,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, McpError>;
}

/// Answers `roots/list`: the filesystem (or other URI) roots this client is
/// willing to expose to the server.
#[async_trait]
pub trait RootsHandler: Send + Sync {
    async fn list_roots(&self, ctx: RequestContext) -> Result<Vec<Root>, McpError>;
}

/// Answers a server-initiated `elicitation/create` request by prompting
/// whoever is on the other end of this client (a human, typically) for
/// input matching `schema`.
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    async fn elicit(
        &self,
        ctx: RequestContext,
        message: String,
        schema: ElicitRequestedSchema,
    ) -> Result<ElicitResult, McpError>;
}

/// Typed callbacks for the list-changed and resource-updated notifications a
/// server may push once a session is `Ready`. All methods default to a
/// no-op so callers only implement the ones they care about.
#[async_trait]
pub trait ServerNotificationHandler: Send + Sync {
    async fn on_tools_list_changed(&self) {}
    async fn on_resources_list_changed(&self) {}
    async fn on_resource_updated(&self, _uri: &str) {}
    async fn on_prompts_list_changed(&self) {}
}
