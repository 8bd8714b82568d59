//! A convenience layer over [`ferrite_mcp_server::ServerBuilder`]: collects
//! tool/resource/prompt registrations once, then builds a fresh
//! [`McpServer`] for every connection it's handed — a single one for stdio,
//! one per incoming session for streamable HTTP.

use std::sync::Arc;

use ferrite_mcp_server::{McpServer, PromptHandler, ResourceHandler, ServerBuilder, ToolHandler};
use ferrite_mcp_stdio::StdioConnection;
use ferrite_mcp_transport_traits::Connection;
use ferrite_mcp_types::ResourceTemplate;

use crate::error::RuntimeResult;

/// Accumulates a server's registrations and stamps out a [`McpServer`]/
/// [`Peer`](ferrite_mcp_protocol::Peer) pair per connection. Registering a
/// bad tool schema is deferred to the point a connection actually arrives
/// ([`build`](Self::build)/[`run_stdio`](Self::run_stdio)), matching
/// `ServerBuilder::tool`'s own fallible signature.
#[derive(Clone)]
pub struct ServerRuntime {
    name: String,
    version: String,
    title: Option<String>,
    instructions: Option<String>,
    tools: Vec<Arc<dyn ToolHandler>>,
    resources: Vec<Arc<dyn ResourceHandler>>,
    resource_templates: Vec<ResourceTemplate>,
    prompts: Vec<Arc<dyn PromptHandler>>,
}

impl ServerRuntime {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
            instructions: None,
            tools: Vec::new(),
            resources: Vec::new(),
            resource_templates: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.instructions = Some(text.into());
        self
    }

    pub fn tool(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push(handler);
        self
    }

    pub fn resource(mut self, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resources.push(handler);
        self
    }

    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        self.resource_templates.push(template);
        self
    }

    pub fn prompt(mut self, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompts.push(handler);
        self
    }

    /// Builds an independent [`McpServer`] over `connection`, registering
    /// every tool/resource/prompt collected so far.
    pub fn build(&self, connection: Arc<dyn Connection>) -> RuntimeResult<(Arc<ferrite_mcp_protocol::Peer>, Arc<McpServer>)> {
        let mut builder = ServerBuilder::new(self.name.clone(), self.version.clone());
        if let Some(title) = &self.title {
            builder = builder.title(title.clone());
        }
        if let Some(instructions) = &self.instructions {
            builder = builder.instructions(instructions.clone());
        }
        for tool in &self.tools {
            builder = builder.tool(Arc::clone(tool))?;
        }
        for resource in &self.resources {
            builder = builder.resource(Arc::clone(resource));
        }
        for template in &self.resource_templates {
            builder = builder.resource_template(template.clone());
        }
        for prompt in &self.prompts {
            builder = builder.prompt(Arc::clone(prompt));
        }
        Ok(builder.build(connection))
    }

    /// Runs this server over the process's own stdin/stdout until the
    /// client closes the connection (EOF on stdin).
    pub async fn run_stdio(&self) -> RuntimeResult<()> {
        let connection = Arc::new(StdioConnection::new());
        let (peer, _server) = self.build(connection)?;
        peer.spawn().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrite_mcp_core::RequestContext;
    use ferrite_mcp_protocol::{CallOptions, Peer, PeerBuilder};
    use ferrite_mcp_transport_traits::memory_pair;
    use ferrite_mcp_types::{CallToolResult, Content, Tool};
    use serde_json::Value;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        async fn call(&self, _ctx: RequestContext, _arguments: Option<Value>) -> ferrite_mcp_server::ServerResult<CallToolResult> {
            Ok(CallToolResult::ok(vec![Content::text("pong")]))
        }

        fn definition(&self) -> Tool {
            Tool {
                name: "echo".to_string(),
                title: None,
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
                output_schema: None,
                annotations: None,
            }
        }
    }

    #[tokio::test]
    async fn build_wires_every_registered_tool_into_a_fresh_server() {
        let runtime = ServerRuntime::new("test-server", "0.1.0").tool(Arc::new(EchoTool));
        let (client_conn, server_conn) = memory_pair(8);
        let (server_peer, _server) = runtime.build(Arc::new(server_conn)).unwrap();
        let _server_task = server_peer.spawn();

        let client: Arc<Peer> = PeerBuilder::new().build(Arc::new(client_conn));
        let _client_task = Arc::clone(&client).spawn();
        client
            .perform_client_handshake(serde_json::json!({
                "protocolVersion": ferrite_mcp_server::PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"},
            }))
            .await
            .unwrap();

        let result = client.call("tools/list", None, CallOptions::default()).await.unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn build_can_be_called_more_than_once_for_independent_sessions() {
        let runtime = ServerRuntime::new("test-server", "0.1.0").tool(Arc::new(EchoTool));
        let (_client_a, server_a) = memory_pair(8);
        let (_client_b, server_b) = memory_pair(8);

        let (peer_a, _) = runtime.build(Arc::new(server_a)).unwrap();
        let (peer_b, _) = runtime.build(Arc::new(server_b)).unwrap();
        assert_ne!(Arc::as_ptr(&peer_a), Arc::as_ptr(&peer_b));
    }

    #[tokio::test]
    async fn an_invalid_tool_schema_is_rejected_at_build_time() {
        struct BadSchemaTool;
        #[async_trait]
        impl ToolHandler for BadSchemaTool {
            async fn call(&self, _ctx: RequestContext, _arguments: Option<Value>) -> ferrite_mcp_server::ServerResult<CallToolResult> {
                Ok(CallToolResult::ok(vec![]))
            }
            fn definition(&self) -> Tool {
                Tool {
                    name: "bad".to_string(),
                    title: None,
                    description: None,
                    input_schema: serde_json::json!({"type": 123}),
                    output_schema: None,
                    annotations: None,
                }
            }
        }

        let runtime = ServerRuntime::new("test-server", "0.1.0").tool(Arc::new(BadSchemaTool));
        let (_client, server_conn) = memory_pair(8);
        assert!(runtime.build(Arc::new(server_conn)).is_err());
    }
}
