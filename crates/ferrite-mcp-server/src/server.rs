use crate::error::{ServerError, ServerResult};
use crate::handlers::{PromptHandler, ResourceHandler, ToolHandler};
use crate::pagination::{paginate, DEFAULT_PAGE_SIZE};
use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use async_trait::async_trait;
use ferrite_mcp_core::{McpError, RequestContext};
use ferrite_mcp_protocol::{NotificationHandler, Peer, PeerBuilder, RequestHandler};
use ferrite_mcp_transport_traits::Connection;
use ferrite_mcp_types::{
    ClientCapabilities, Cursor, Implementation, InitializeResult, ListChangedCapability, Prompt,
    Resource, ResourceContents, ResourceTemplate, ResourcesCapability, ServerCapabilities, Tool,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use tracing::debug;

/// MCP protocol revision this server speaks. Clients requesting a different
/// version still get this one back; `ferrite-mcp-server` does not downgrade
/// its own behavior to match an older client.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Serialize)]
struct ListToolsResult {
    tools: Vec<Tool>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<Cursor>,
}

#[derive(Serialize)]
struct ListResourcesResult {
    resources: Vec<Resource>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<Cursor>,
}

#[derive(Serialize)]
struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    resource_templates: Vec<ResourceTemplate>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<Cursor>,
}

#[derive(Serialize)]
struct ListPromptsResult {
    prompts: Vec<Prompt>,
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    next_cursor: Option<Cursor>,
}

#[derive(Serialize)]
struct ReadResourceResult {
    contents: Vec<ResourceContents>,
}

/// Implements the server side of MCP by dispatching JSON-RPC methods into
/// the tool/resource/prompt registries. Installed as a [`Peer`]'s
/// [`RequestHandler`]/[`NotificationHandler`] by [`ServerBuilder::build`],
/// which also hands it a weak back-reference to the peer so it can push
/// `notifications/resources/updated` and `*/list_changed` notifications.
pub struct McpServer {
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
    capabilities: ServerCapabilities,
    server_info: Implementation,
    instructions: Option<String>,
    peer: OnceLock<Weak<Peer>>,
}

impl McpServer {
    fn peer(&self) -> Option<Arc<Peer>> {
        self.peer.get().and_then(Weak::upgrade)
    }

    /// Notify subscribed peers that `uri`'s contents changed. A no-op if
    /// nobody is currently subscribed to it.
    pub async fn notify_resource_updated(&self, uri: &str) {
        if !self.resources.is_subscribed(uri) {
            return;
        }
        if let Some(peer) = self.peer() {
            let _ = peer
                .notify(
                    "notifications/resources/updated",
                    Some(serde_json::json!({ "uri": uri })),
                )
                .await;
        }
    }

    pub async fn notify_tools_list_changed(&self) {
        if let Some(peer) = self.peer() {
            let _ = peer.notify("notifications/tools/list_changed", None).await;
        }
    }

    pub async fn notify_resources_list_changed(&self) {
        if let Some(peer) = self.peer() {
            let _ = peer.notify("notifications/resources/list_changed", None).await;
        }
    }

    pub async fn notify_prompts_list_changed(&self) {
        if let Some(peer) = self.peer() {
            let _ = peer.notify("notifications/prompts/list_changed", None).await;
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::invalid_params("initialize requires params"))?;
        let _client_capabilities: ClientCapabilities =
            serde_json::from_value(params.get("capabilities").cloned().unwrap_or(Value::Null))
                .unwrap_or_default();
        let client_info = params
            .get("clientInfo")
            .ok_or_else(|| McpError::invalid_params("initialize requires clientInfo"))?;
        if client_info.get("name").and_then(Value::as_str).is_none() {
            return Err(McpError::invalid_params("clientInfo.name is required"));
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn cursor_from_params(params: &Option<Value>) -> Option<Cursor> {
        params.as_ref()?.get("cursor")?.as_str().map(str::to_string)
    }

    fn handle_tools_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let cursor = Self::cursor_from_params(&params);
        let definitions = self.tools.definitions();
        let (tools, next_cursor) = paginate(&definitions, cursor.as_ref(), DEFAULT_PAGE_SIZE)?;
        Ok(serde_json::to_value(ListToolsResult { tools, next_cursor })?)
    }

    async fn handle_tools_call(&self, ctx: RequestContext, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::invalid_params("tools/call requires params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("tools/call requires a tool name"))?;
        let arguments = params.get("arguments").cloned();
        let validated = arguments.clone().unwrap_or_else(|| Value::Object(Default::default()));
        self.tools.validate(name, &validated)?;

        let handler = self
            .tools
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("tool '{name}'")))?;
        let result = handler.call(ctx, arguments).await?;
        Ok(serde_json::to_value(result)?)
    }

    fn handle_resources_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let cursor = Self::cursor_from_params(&params);
        let definitions = self.resources.definitions();
        let (resources, next_cursor) = paginate(&definitions, cursor.as_ref(), DEFAULT_PAGE_SIZE)?;
        Ok(serde_json::to_value(ListResourcesResult { resources, next_cursor })?)
    }

    fn handle_resource_templates_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let cursor = Self::cursor_from_params(&params);
        let definitions = self.resources.templates();
        let (resource_templates, next_cursor) =
            paginate(&definitions, cursor.as_ref(), DEFAULT_PAGE_SIZE)?;
        Ok(serde_json::to_value(ListResourceTemplatesResult {
            resource_templates,
            next_cursor,
        })?)
    }

    async fn handle_resources_read(&self, ctx: RequestContext, params: Option<Value>) -> Result<Value, McpError> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("resources/read requires a uri"))?;
        let handler = self
            .resources
            .get(uri)
            .ok_or_else(|| ServerError::NotFound(format!("resource '{uri}'")))?;
        let contents = handler.read(ctx, uri).await?;
        Ok(serde_json::to_value(ReadResourceResult { contents })?)
    }

    fn handle_resources_subscribe(&self, params: Option<Value>) -> Result<Value, McpError> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("resources/subscribe requires a uri"))?;
        self.resources.subscribe(uri)?;
        Ok(Value::Object(Default::default()))
    }

    fn handle_resources_unsubscribe(&self, params: Option<Value>) -> Result<Value, McpError> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("resources/unsubscribe requires a uri"))?;
        self.resources.unsubscribe(uri);
        Ok(Value::Object(Default::default()))
    }

    fn handle_prompts_list(&self, params: Option<Value>) -> Result<Value, McpError> {
        let cursor = Self::cursor_from_params(&params);
        let definitions = self.prompts.definitions();
        let (prompts, next_cursor) = paginate(&definitions, cursor.as_ref(), DEFAULT_PAGE_SIZE)?;
        Ok(serde_json::to_value(ListPromptsResult { prompts, next_cursor })?)
    }

    async fn handle_prompts_get(&self, ctx: RequestContext, params: Option<Value>) -> Result<Value, McpError> {
        let params = params.ok_or_else(|| McpError::invalid_params("prompts/get requires params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::invalid_params("prompts/get requires a name"))?;
        let arguments: Option<HashMap<String, String>> = params
            .get("arguments")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?;
        let handler = self
            .prompts
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("prompt '{name}'")))?;
        let result = handler.get(ctx, arguments).await?;
        Ok(serde_json::to_value(result)?)
    }
}

#[async_trait]
impl RequestHandler for McpServer {
    async fn handle(&self, ctx: RequestContext, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        match method {
            "initialize" => self.handle_initialize(params),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => self.handle_tools_list(params),
            "tools/call" => self.handle_tools_call(ctx, params).await,
            "resources/list" => self.handle_resources_list(params),
            "resources/templates/list" => self.handle_resource_templates_list(params),
            "resources/read" => self.handle_resources_read(ctx, params).await,
            "resources/subscribe" => self.handle_resources_subscribe(params),
            "resources/unsubscribe" => self.handle_resources_unsubscribe(params),
            "prompts/list" => self.handle_prompts_list(params),
            "prompts/get" => self.handle_prompts_get(ctx, params).await,
            other => Err(McpError::method_not_found(other)),
        }
    }
}

#[async_trait]
impl NotificationHandler for McpServer {
    async fn handle(&self, method: &str, _params: Option<Value>) {
        match method {
            "notifications/roots/list_changed" => {
                debug!("client announced its roots list changed");
            }
            other => debug!(method = other, "unhandled notification"),
        }
    }
}

/// Builds an [`McpServer`] by registering tools/resources/prompts, then
/// wires it to a fresh [`Peer`] over the given connection.
pub struct ServerBuilder {
    server_info: Implementation,
    instructions: Option<String>,
    tools: ToolRegistry,
    resources: ResourceRegistry,
    prompts: PromptRegistry,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            server_info: Implementation {
                name: name.into(),
                version: version.into(),
                title: None,
            },
            instructions: None,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.server_info.title = Some(title.into());
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = Some(text.into());
        self
    }

    /// Registers a tool, compiling its input schema immediately. Fails if
    /// the schema itself is not valid JSON Schema.
    pub fn tool(self, handler: Arc<dyn ToolHandler>) -> ServerResult<Self> {
        self.tools.register(handler)?;
        Ok(self)
    }

    pub fn resource(self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resources.register(handler);
        self
    }

    pub fn resource_template(self, template: ResourceTemplate) -> Self {
        self.resources.register_template(template);
        self
    }

    pub fn prompt(self, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompts.register(handler);
        self
    }

    /// Returns both the running [`Peer`] and the [`McpServer`] backing it —
    /// the latter is how callers push `resources/updated` and `*/list_changed`
    /// notifications after the fact (e.g. from a background task that
    /// watches a resource for changes).
    pub fn build(self, connection: Arc<dyn Connection>) -> (Arc<Peer>, Arc<McpServer>) {
        let capabilities = ServerCapabilities {
            tools: Some(ListChangedCapability { list_changed: Some(true) }),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            prompts: Some(ListChangedCapability { list_changed: Some(true) }),
            logging: None,
            completions: None,
            extra: Default::default(),
        };

        let server = Arc::new(McpServer {
            tools: self.tools,
            resources: self.resources,
            prompts: self.prompts,
            capabilities,
            server_info: self.server_info,
            instructions: self.instructions,
            peer: OnceLock::new(),
        });

        let peer = PeerBuilder::new()
            .request_handler(Arc::clone(&server) as Arc<dyn RequestHandler>)
            .notification_handler(Arc::clone(&server) as Arc<dyn NotificationHandler>)
            .build(connection);

        let _ = server.peer.set(Arc::downgrade(&peer));
        (peer, server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerResult;
    use async_trait::async_trait;
    use ferrite_mcp_protocol::{CallError, CallOptions};
    use ferrite_mcp_transport_traits::memory_pair;
    use ferrite_mcp_types::{CallToolResult, Content};
    use std::sync::Mutex;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, _ctx: RequestContext, arguments: Option<Value>) -> ServerResult<CallToolResult> {
            let text = arguments
                .as_ref()
                .and_then(|a| a.get("x"))
                .and_then(Value::as_i64)
                .map(|x| x.to_string())
                .unwrap_or_default();
            Ok(CallToolResult::ok(vec![Content::text(text)]))
        }

        fn definition(&self) -> Tool {
            Tool {
                name: "echo".to_string(),
                title: None,
                description: Some("echoes the x argument".to_string()),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": { "x": { "type": "integer" } },
                    "required": ["x"]
                }),
                output_schema: None,
                annotations: None,
            }
        }
    }

    struct TextResource(String);

    #[async_trait]
    impl ResourceHandler for TextResource {
        async fn read(&self, _ctx: RequestContext, uri: &str) -> ServerResult<Vec<ResourceContents>> {
            Ok(vec![ResourceContents {
                uri: uri.to_string(),
                mime_type: Some("text/plain".to_string()),
                text: Some(self.0.clone()),
                blob: None,
            }])
        }

        fn definition(&self) -> Resource {
            Resource {
                uri: "mem://note".to_string(),
                name: "note".to_string(),
                title: None,
                description: None,
                mime_type: Some("text/plain".to_string()),
                size: None,
            }
        }
    }

    fn init_params() -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0.0" }
        })
    }

    #[tokio::test]
    async fn initialize_then_list_and_call_tool() {
        let (client_conn, server_conn) = memory_pair(8);
        let (server_peer, _server) = ServerBuilder::new("test-server", "0.1.0")
            .tool(Arc::new(EchoTool))
            .unwrap()
            .build(Arc::new(server_conn));
        let _server_task = server_peer.spawn();

        let client = PeerBuilder::new().build(Arc::new(client_conn));
        let _client_task = Arc::clone(&client).spawn();

        client.perform_client_handshake(init_params()).await.unwrap();

        let list = client.call("tools/list", None, CallOptions::default()).await.unwrap();
        assert_eq!(list["tools"][0]["name"], "echo");

        let result = client
            .call(
                "tools/call",
                Some(serde_json::json!({"name": "echo", "arguments": {"x": 7}})),
                CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(result["content"][0]["text"], "7");
    }

    #[tokio::test]
    async fn tools_call_rejects_missing_required_argument() {
        let (client_conn, server_conn) = memory_pair(8);
        let (server_peer, _server) = ServerBuilder::new("test-server", "0.1.0")
            .tool(Arc::new(EchoTool))
            .unwrap()
            .build(Arc::new(server_conn));
        let _server_task = server_peer.spawn();

        let client = PeerBuilder::new().build(Arc::new(client_conn));
        let _client_task = Arc::clone(&client).spawn();
        client.perform_client_handshake(init_params()).await.unwrap();

        let err = client
            .call(
                "tools/call",
                Some(serde_json::json!({"name": "echo", "arguments": {}})),
                CallOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Remote(code, _) if code == McpError::invalid_params("").kind.code()));
    }

    #[tokio::test]
    async fn subscribing_to_a_resource_receives_update_notifications() {
        let (client_conn, server_conn) = memory_pair(8);
        let (server_peer, server) = ServerBuilder::new("test-server", "0.1.0")
            .resource(Arc::new(TextResource("hello".to_string())))
            .build(Arc::new(server_conn));
        let _server_task = server_peer.spawn();

        struct Capture(Arc<Mutex<Vec<String>>>);

        #[async_trait]
        impl NotificationHandler for Capture {
            async fn handle(&self, method: &str, params: Option<Value>) {
                if method == "notifications/resources/updated" {
                    if let Some(uri) = params.as_ref().and_then(|p| p.get("uri")).and_then(Value::as_str) {
                        self.0.lock().unwrap().push(uri.to_string());
                    }
                }
            }
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let client = PeerBuilder::new()
            .notification_handler(Arc::new(Capture(Arc::clone(&received))))
            .build(Arc::new(client_conn));
        let _client_task = Arc::clone(&client).spawn();
        client.perform_client_handshake(init_params()).await.unwrap();

        client
            .call(
                "resources/subscribe",
                Some(serde_json::json!({"uri": "mem://note"})),
                CallOptions::default(),
            )
            .await
            .unwrap();

        server.notify_resource_updated("mem://note").await;
        // give the notification a moment to land on the client's dispatch loop
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(received.lock().unwrap().as_slice(), ["mem://note"]);
    }
}
