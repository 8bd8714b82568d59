//! The client role: a [`Client`] for the outbound calls an application
//! makes, and a [`ClientBuilder`] that wires up the handlers answering the
//! three requests a server may send back — `sampling/createMessage`,
//! `elicitation/create`, `roots/list` — plus the list-changed and
//! resource-updated notifications it may push once a session is `Ready`.

mod client;
mod error;
mod handlers;
mod session;

pub use client::{Client, ClientBuilder, PROTOCOL_VERSION};
pub use error::{ClientError, ClientResult};
pub use handlers::{ElicitationHandler, RootsHandler, SamplingHandler, ServerNotificationHandler};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrite_mcp_core::{McpError, RequestContext};
    use ferrite_mcp_protocol::{CallError, CallOptions, NotificationHandler, Peer, PeerBuilder};
    use ferrite_mcp_transport_traits::memory_pair;
    use ferrite_mcp_types::{Content, CreateMessageParams, CreateMessageResult, Root};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct StaticSampler;

    #[async_trait]
    impl SamplingHandler for StaticSampler {
        async fn create_message(
            &self,
            _ctx: RequestContext,
            params: CreateMessageParams,
        ) -> Result<CreateMessageResult, McpError> {
            Ok(CreateMessageResult {
                role: "assistant".to_string(),
                content: Content::text(format!("echo of {} messages", params.messages.len())),
                model: "test-model".to_string(),
                stop_reason: Some("endTurn".to_string()),
            })
        }
    }

    struct OneRoot;

    #[async_trait]
    impl RootsHandler for OneRoot {
        async fn list_roots(&self, _ctx: RequestContext) -> Result<Vec<Root>, McpError> {
            Ok(vec![Root { uri: "file:///workspace".to_string(), name: Some("workspace".to_string()) }])
        }
    }

    /// Answers just enough of the server side of a handshake for these
    /// tests: a fixed `InitializeResult`, nothing else.
    struct FixedInitializeServer;

    #[async_trait]
    impl ferrite_mcp_protocol::RequestHandler for FixedInitializeServer {
        async fn handle(&self, _ctx: RequestContext, method: &str, _params: Option<serde_json::Value>) -> Result<serde_json::Value, McpError> {
            match method {
                "initialize" => Ok(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "serverInfo": {"name": "fixture-server", "version": "0.0.0"},
                })),
                other => Err(McpError::method_not_found(other)),
            }
        }
    }

    #[tokio::test]
    async fn initialize_populates_capabilities_from_registered_handlers() {
        let (client_conn, server_conn) = memory_pair(16);
        let server = PeerBuilder::new()
            .id("server")
            .request_handler(Arc::new(FixedInitializeServer))
            .build(Arc::new(server_conn));
        server.clone().spawn();

        let client = ClientBuilder::new("test-client", "0.1.0")
            .sampling_handler(Arc::new(StaticSampler))
            .roots_handler(Arc::new(OneRoot))
            .connect(Arc::new(client_conn));
        client.peer().clone().spawn();

        let result = client.initialize().await.unwrap();
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn answers_server_initiated_sampling_request() {
        let (server_conn, client_conn) = memory_pair(16);
        let client = ClientBuilder::new("test-client", "0.1.0")
            .sampling_handler(Arc::new(StaticSampler))
            .connect(Arc::new(client_conn));
        let client_peer = client.peer().clone();
        client_peer.set_state(ferrite_mcp_protocol::NegotiationState::Initializing).unwrap();
        client_peer.set_state(ferrite_mcp_protocol::NegotiationState::Ready).unwrap();
        client_peer.spawn();

        let server = PeerBuilder::new().id("server").build(Arc::new(server_conn));
        server.set_state(ferrite_mcp_protocol::NegotiationState::Initializing).unwrap();
        server.set_state(ferrite_mcp_protocol::NegotiationState::Ready).unwrap();
        server.clone().spawn();

        let params = serde_json::to_value(CreateMessageParams {
            messages: vec![],
            max_tokens: 64,
            system_prompt: None,
            model_preferences: None,
            temperature: None,
            stop_sequences: None,
        })
        .unwrap();
        let result = server
            .call("sampling/createMessage", Some(params), CallOptions::default())
            .await
            .unwrap();
        let result: CreateMessageResult = serde_json::from_value(result).unwrap();
        assert_eq!(result.model, "test-model");
    }

    #[tokio::test]
    async fn unregistered_elicitation_handler_yields_method_not_found() {
        let (server_conn, client_conn) = memory_pair(16);
        let client = ClientBuilder::new("test-client", "0.1.0").connect(Arc::new(client_conn));
        let client_peer = client.peer().clone();
        client_peer.set_state(ferrite_mcp_protocol::NegotiationState::Initializing).unwrap();
        client_peer.set_state(ferrite_mcp_protocol::NegotiationState::Ready).unwrap();
        client_peer.spawn();

        let server = PeerBuilder::new().id("server").build(Arc::new(server_conn));
        server.set_state(ferrite_mcp_protocol::NegotiationState::Initializing).unwrap();
        server.set_state(ferrite_mcp_protocol::NegotiationState::Ready).unwrap();
        server.clone().spawn();

        let err = server
            .call(
                "elicitation/create",
                Some(serde_json::json!({"message": "confirm?", "requestedSchema": {"type":"object","properties":{}}})),
                CallOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            CallError::Remote(code, _) => assert_eq!(code, McpError::method_not_found("x").kind.code()),
            other => panic!("expected Remote error, got {other:?}"),
        }
    }

    struct FlagNotifications(Arc<AtomicBool>);

    #[async_trait]
    impl ServerNotificationHandler for FlagNotifications {
        async fn on_tools_list_changed(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn routes_list_changed_notification_to_handler() {
        let (client_conn, server_conn) = memory_pair(16);
        let seen = Arc::new(AtomicBool::new(false));
        let client = ClientBuilder::new("test-client", "0.1.0")
            .notification_handler(Arc::new(FlagNotifications(Arc::clone(&seen))))
            .connect(Arc::new(client_conn));
        client.peer().clone().spawn();

        let server = PeerBuilder::new().id("server").build(Arc::new(server_conn));
        server.notify("notifications/tools/list_changed", None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(seen.load(Ordering::SeqCst));
    }
}
