use crate::error::ClientResult;
use crate::handlers::{ElicitationHandler, RootsHandler, SamplingHandler, ServerNotificationHandler};
use crate::session::ClientSession;
use ferrite_mcp_protocol::{CallOptions, NotificationHandler, Peer, PeerBuilder, RequestHandler};
use ferrite_mcp_transport_traits::Connection;
use ferrite_mcp_types::{
    CallToolResult, ClientCapabilities, Cursor, GetPromptResult, Implementation, InitializeResult, Prompt,
    Resource, ResourceContents, ResourceTemplate, RootsCapability, Tool,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Protocol revision this crate speaks. Kept independent of
/// `ferrite-mcp-server`'s own constant rather than shared across a
/// client-server dependency edge neither role needs.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Deserialize)]
struct ListToolsResult {
    tools: Vec<Tool>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<Cursor>,
}

#[derive(Deserialize)]
struct ListResourcesResult {
    resources: Vec<Resource>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<Cursor>,
}

#[derive(Deserialize)]
struct ListResourceTemplatesResult {
    #[serde(rename = "resourceTemplates")]
    resource_templates: Vec<ResourceTemplate>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<Cursor>,
}

#[derive(Deserialize)]
struct ListPromptsResult {
    prompts: Vec<Prompt>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<Cursor>,
}

#[derive(Deserialize)]
struct ReadResourceResult {
    contents: Vec<ResourceContents>,
}

/// A friendly, typed handle onto the client side of a session: the methods
/// a tool-calling application actually reaches for. Answering the server's
/// own requests (sampling, elicitation, roots) is handled by the
/// [`ClientSession`] wired up alongside this at [`ClientBuilder::connect`]
/// time, not exposed here.
pub struct Client {
    peer: Arc<Peer>,
    client_info: Implementation,
    capabilities: ClientCapabilities,
}

impl Client {
    /// Drives the `initialize` / `notifications/initialized` handshake.
    /// The session's dispatch loop (`peer.spawn()`) must already be running,
    /// or this will wait forever for a response that never arrives.
    pub async fn initialize(&self) -> ClientResult<InitializeResult> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "clientInfo": self.client_info,
        });
        let value = self.peer.perform_client_handshake(params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn ping(&self) -> ClientResult<()> {
        self.peer.call("ping", None, CallOptions::default()).await?;
        Ok(())
    }

    pub async fn list_tools(&self, cursor: Option<Cursor>) -> ClientResult<(Vec<Tool>, Option<Cursor>)> {
        let params = cursor.map(|c| json!({ "cursor": c }));
        let value = self.peer.call("tools/list", params, CallOptions::default()).await?;
        let result: ListToolsResult = serde_json::from_value(value)?;
        Ok((result.tools, result.next_cursor))
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> ClientResult<CallToolResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self.peer.call("tools/call", Some(params), CallOptions::default()).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn list_resources(&self, cursor: Option<Cursor>) -> ClientResult<(Vec<Resource>, Option<Cursor>)> {
        let params = cursor.map(|c| json!({ "cursor": c }));
        let value = self.peer.call("resources/list", params, CallOptions::default()).await?;
        let result: ListResourcesResult = serde_json::from_value(value)?;
        Ok((result.resources, result.next_cursor))
    }

    pub async fn list_resource_templates(
        &self,
        cursor: Option<Cursor>,
    ) -> ClientResult<(Vec<ResourceTemplate>, Option<Cursor>)> {
        let params = cursor.map(|c| json!({ "cursor": c }));
        let value = self.peer.call("resources/templates/list", params, CallOptions::default()).await?;
        let result: ListResourceTemplatesResult = serde_json::from_value(value)?;
        Ok((result.resource_templates, result.next_cursor))
    }

    pub async fn read_resource(&self, uri: &str) -> ClientResult<Vec<ResourceContents>> {
        let params = json!({ "uri": uri });
        let value = self.peer.call("resources/read", Some(params), CallOptions::default()).await?;
        let result: ReadResourceResult = serde_json::from_value(value)?;
        Ok(result.contents)
    }

    pub async fn subscribe(&self, uri: &str) -> ClientResult<()> {
        let params = json!({ "uri": uri });
        self.peer.call("resources/subscribe", Some(params), CallOptions::default()).await?;
        Ok(())
    }

    pub async fn unsubscribe(&self, uri: &str) -> ClientResult<()> {
        let params = json!({ "uri": uri });
        self.peer.call("resources/unsubscribe", Some(params), CallOptions::default()).await?;
        Ok(())
    }

    pub async fn list_prompts(&self, cursor: Option<Cursor>) -> ClientResult<(Vec<Prompt>, Option<Cursor>)> {
        let params = cursor.map(|c| json!({ "cursor": c }));
        let value = self.peer.call("prompts/list", params, CallOptions::default()).await?;
        let result: ListPromptsResult = serde_json::from_value(value)?;
        Ok((result.prompts, result.next_cursor))
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> ClientResult<GetPromptResult> {
        let params = json!({ "name": name, "arguments": arguments });
        let value = self.peer.call("prompts/get", Some(params), CallOptions::default()).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// The underlying peer, for callers that need to spawn its dispatch
    /// loop, issue a raw call the typed methods above don't cover, or watch
    /// negotiation state directly.
    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }
}

/// Builds a [`Client`] and the [`ClientSession`] that answers server-pushed
/// requests, then wires both to a single [`Peer`] over a connection.
#[derive(Default)]
pub struct ClientBuilder {
    client_info: Option<Implementation>,
    sampling: Option<Arc<dyn SamplingHandler>>,
    roots: Option<Arc<dyn RootsHandler>>,
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    notifications: Option<Arc<dyn ServerNotificationHandler>>,
}

impl ClientBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            client_info: Some(Implementation {
                name: name.into(),
                version: version.into(),
                title: None,
            }),
            ..Default::default()
        }
    }

    pub fn sampling_handler(mut self, handler: Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(handler);
        self
    }

    pub fn roots_handler(mut self, handler: Arc<dyn RootsHandler>) -> Self {
        self.roots = Some(handler);
        self
    }

    pub fn elicitation_handler(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation = Some(handler);
        self
    }

    pub fn notification_handler(mut self, handler: Arc<dyn ServerNotificationHandler>) -> Self {
        self.notifications = Some(handler);
        self
    }

    /// Wires a [`ClientSession`] to `connection` through a fresh [`Peer`]
    /// and returns the friendly [`Client`] handle. The caller is
    /// responsible for calling `client.peer().clone().spawn()` before
    /// `initialize()`, matching `ServerBuilder::build`'s convention of
    /// leaving dispatch-loop lifecycle to its caller.
    pub fn connect(self, connection: Arc<dyn Connection>) -> Client {
        let capabilities = ClientCapabilities {
            roots: self.roots.as_ref().map(|_| RootsCapability { list_changed: Some(true) }),
            sampling: self.sampling.as_ref().map(|_| json!({})),
            elicitation: self.elicitation.as_ref().map(|_| json!({})),
            extra: Default::default(),
        };
        let session = Arc::new(ClientSession {
            sampling: self.sampling,
            roots: self.roots,
            elicitation: self.elicitation,
            notifications: self.notifications,
        });
        let peer = PeerBuilder::new()
            .request_handler(Arc::clone(&session) as Arc<dyn RequestHandler>)
            .notification_handler(session as Arc<dyn NotificationHandler>)
            .build(connection);
        Client {
            peer,
            client_info: self.client_info.unwrap_or_else(|| Implementation {
                name: "ferrite-mcp-client".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            }),
            capabilities,
        }
    }
}
