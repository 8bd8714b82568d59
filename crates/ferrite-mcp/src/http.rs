//! Wires [`ServerRuntime`] to [`StreamableHttpTransport`]: drains the
//! transport's new-session channel and spawns an independent
//! [`Peer`](ferrite_mcp_protocol::Peer) for each one, sharing this
//! runtime's tool/resource/prompt registrations.

use std::sync::Arc;

use ferrite_mcp_http::SessionId;
use ferrite_mcp_transport_traits::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::server::ServerRuntime;

/// Spawns a background task that drains `new_sessions` (the receiver
/// returned alongside a [`StreamableHttpTransport`](ferrite_mcp_http::StreamableHttpTransport)
/// from its own `new`) and builds a fresh `Peer` over `runtime`'s
/// registrations for each incoming session. Dropping the returned handle
/// does not stop the task; call [`JoinHandle::abort`] to shut it down.
pub fn serve_http_sessions(
    runtime: Arc<ServerRuntime>,
    mut new_sessions: mpsc::UnboundedReceiver<(SessionId, Arc<dyn Connection>)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((id, connection)) = new_sessions.recv().await {
            match runtime.build(connection) {
                Ok((peer, _server)) => {
                    debug!(session = %id, "spawning peer for new streamable HTTP session");
                    let _peer_task = peer.spawn();
                }
                Err(error) => warn!(session = %id, %error, "failed to build server for new session"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_mcp_http::{StreamableHttpConfig, StreamableHttpTransport};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn posting_initialize_reaches_a_freshly_spawned_session_peer() {
        let runtime = Arc::new(ServerRuntime::new("test-server", "0.1.0"));
        let (transport, new_sessions) = StreamableHttpTransport::new(StreamableHttpConfig::default());
        let _drain = serve_http_sessions(Arc::clone(&runtime), new_sessions);
        let router = transport.router();

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": ferrite_mcp_server::PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0.0"},
            },
        });
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["result"]["protocolVersion"], ferrite_mcp_server::PROTOCOL_VERSION);
    }
}
