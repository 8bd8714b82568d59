use crate::connection::HttpSessionConnection;
use crate::error::HttpTransportError;
use crate::event_store::{parse_last_event_id, EventStore, StoredEvent};
use crate::host_guard::HostGuard;
use crate::session::SessionId;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use dashmap::DashMap;
use ferrite_mcp_transport_traits::Connection;
use ferrite_mcp_wire::{Codec, JsonCodec, Message, RequestId};
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, warn};

/// State threaded through the POST reply SSE `unfold`: once the receiver
/// lags, the stream yields one `Err` event and then closes for good — it
/// never falls back to `Active` and resumes silently skipping messages.
enum SsePostState {
    Active(broadcast::Receiver<StoredEvent>, HashSet<RequestId>),
    Closed,
}

/// Same idea for the GET long-poll stream, which has no per-request
/// `pending` set to track.
enum SseGetState {
    Active(broadcast::Receiver<StoredEvent>),
    Closed,
}

pub const DEFAULT_ENDPOINT_PATH: &str = "/mcp";
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Configuration for a [`StreamableHttpTransport`]. Build with
/// [`StreamableHttpConfigBuilder`].
#[derive(Clone)]
pub struct StreamableHttpConfig {
    pub endpoint_path: String,
    pub replay_buffer_size: usize,
    pub inbox_capacity: usize,
    pub outbound_capacity: usize,
    /// When set, no `Mcp-Session-Id` is issued: every POST is an
    /// independent interaction with no GET stream and no replay.
    pub stateless: bool,
    pub host_guard: Option<Arc<HostGuard>>,
}

impl Default for StreamableHttpConfig {
    fn default() -> Self {
        Self {
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            replay_buffer_size: 256,
            inbox_capacity: 32,
            outbound_capacity: 256,
            stateless: false,
            host_guard: None,
        }
    }
}

#[derive(Default)]
pub struct StreamableHttpConfigBuilder {
    config: StreamableHttpConfig,
}

impl StreamableHttpConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn with_replay_buffer_size(mut self, size: usize) -> Self {
        self.config.replay_buffer_size = size;
        self
    }

    pub fn with_inbox_capacity(mut self, size: usize) -> Self {
        self.config.inbox_capacity = size;
        self
    }

    pub fn with_outbound_capacity(mut self, size: usize) -> Self {
        self.config.outbound_capacity = size;
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.config.stateless = stateless;
        self
    }

    pub fn with_host_guard(mut self, guard: HostGuard) -> Self {
        self.config.host_guard = Some(Arc::new(guard));
        self
    }

    pub fn build(self) -> StreamableHttpConfig {
        self.config
    }
}

/// The streamable HTTP transport: a single `/mcp`-style endpoint handling
/// POST (send a batch, get a reply), GET (long-poll SSE push, resumable via
/// `Last-Event-ID`), and DELETE (terminate a session).
///
/// This type never constructs a `Peer` itself — it hands newly-created
/// per-session [`Connection`]s out through the channel returned by
/// [`StreamableHttpTransport::new`], for the caller to wire into whatever
/// drives the protocol layer. That keeps this crate at the same
/// `Connection`-only level as the stdio and in-memory transports.
pub struct StreamableHttpTransport {
    config: StreamableHttpConfig,
    sessions: DashMap<SessionId, Arc<HttpSessionConnection>>,
    events: Arc<EventStore>,
    new_sessions: mpsc::UnboundedSender<(SessionId, Arc<dyn Connection>)>,
    codec: JsonCodec,
}

impl StreamableHttpTransport {
    pub fn new(
        config: StreamableHttpConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<(SessionId, Arc<dyn Connection>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = Arc::new(EventStore::new(config.replay_buffer_size));
        let transport = Arc::new(Self {
            sessions: DashMap::new(),
            events,
            new_sessions: tx,
            codec: JsonCodec::new(),
            config,
        });
        (transport, rx)
    }

    pub fn router(self: &Arc<Self>) -> Router {
        let router = Router::new()
            .route(
                &self.config.endpoint_path,
                post(handle_post).get(handle_get).delete(handle_delete),
            )
            .with_state(Arc::clone(self));
        match self.config.host_guard.clone() {
            Some(guard) => router.layer(axum::middleware::from_fn_with_state(guard, host_guard_middleware)),
            None => router,
        }
    }

    /// Decodes a POST body into one or more messages. A single JSON object
    /// keeps the strict, duplicate-key-rejecting codec; a batched JSON
    /// array is split through a generic `Value` parse first, which loses
    /// that rejection for keys duplicated within one batched message.
    fn decode_batch(&self, body: &[u8]) -> Result<Vec<Message>, HttpTransportError> {
        let first_non_ws = body.iter().find(|b| !b.is_ascii_whitespace());
        if first_non_ws != Some(&b'[') {
            return Ok(vec![self.codec.decode(body)?]);
        }
        let items: Vec<serde_json::Value> =
            serde_json::from_slice(body).map_err(|e| ferrite_mcp_wire::CodecError::Syntax(e.to_string()))?;
        items
            .into_iter()
            .map(|item| {
                let bytes = serde_json::to_vec(&item).expect("re-serializing a parsed JSON value cannot fail");
                self.codec.decode(&bytes)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(HttpTransportError::from)
    }

    fn session_for_post(
        &self,
        headers: &HeaderMap,
        messages: &[Message],
    ) -> Result<(Arc<HttpSessionConnection>, bool), StatusCode> {
        if let Some(id) = session_id_header(headers) {
            return self
                .sessions
                .get(&id)
                .map(|entry| (Arc::clone(entry.value()), false))
                .ok_or(StatusCode::NOT_FOUND);
        }

        if self.config.stateless {
            let connection = self.new_connection(SessionId::new());
            return Ok((connection, false));
        }

        let is_initialize = messages.iter().any(|m| m.method() == Some("initialize"));
        if !is_initialize {
            return Err(StatusCode::BAD_REQUEST);
        }
        let id = SessionId::new();
        let connection = self.new_connection(id.clone());
        self.sessions.insert(id, Arc::clone(&connection));
        Ok((connection, true))
    }

    fn new_connection(&self, id: SessionId) -> Arc<HttpSessionConnection> {
        let connection = Arc::new(HttpSessionConnection::new(
            id.clone(),
            Arc::clone(&self.events),
            self.config.inbox_capacity,
            self.config.outbound_capacity,
        ));
        let _ = self.new_sessions.send((id, Arc::clone(&connection) as Arc<dyn Connection>));
        connection
    }
}

fn session_id_header(headers: &HeaderMap) -> Option<SessionId> {
    headers.get(MCP_SESSION_ID_HEADER).and_then(|v| v.to_str().ok()).map(|s| SessionId::from(s.to_string()))
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/event-stream"))
        .unwrap_or(false)
}

fn to_sse_event(codec: &JsonCodec, stream_id: &str, stored: StoredEvent) -> Event {
    let id = stored.event_id(stream_id);
    match codec.encode(&stored.message) {
        Ok(bytes) => Event::default().id(id).data(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            error!(error = %e, "failed to encode event for SSE stream");
            Event::default().id(id).comment("encode error")
        }
    }
}

fn responses_to_json(responses: Vec<Message>) -> serde_json::Value {
    let mut values: Vec<serde_json::Value> = responses
        .into_iter()
        .filter_map(|m| match m {
            Message::Response(r) => serde_json::to_value(r).ok(),
            _ => None,
        })
        .collect();
    if values.len() == 1 {
        values.pop().unwrap()
    } else {
        serde_json::Value::Array(values)
    }
}

async fn collect_responses(mut sub: broadcast::Receiver<StoredEvent>, mut pending: HashSet<RequestId>) -> Vec<Message> {
    let mut collected = Vec::new();
    while !pending.is_empty() {
        match sub.recv().await {
            Ok(stored) => {
                if let Message::Response(r) = &stored.message {
                    if pending.remove(&r.id) {
                        collected.push(stored.message);
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "POST response collector lagged behind outbound broadcast");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    collected
}

fn attach_session_header(mut response: Response, session_id: &SessionId) -> Response {
    if let Ok(value) = axum::http::HeaderValue::from_str(session_id.as_ref()) {
        response.headers_mut().insert(MCP_SESSION_ID_HEADER, value);
    }
    response
}

async fn handle_post(State(transport): State<Arc<StreamableHttpTransport>>, headers: HeaderMap, body: Bytes) -> Response {
    let messages = match transport.decode_batch(&body) {
        Ok(m) if !m.is_empty() => m,
        Ok(_) => return (StatusCode::BAD_REQUEST, "empty batch").into_response(),
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let (connection, is_new) = match transport.session_for_post(&headers, &messages) {
        Ok(pair) => pair,
        Err(status) => return status.into_response(),
    };

    let pending: HashSet<RequestId> = messages
        .iter()
        .filter_map(|m| match m {
            Message::Request(r) => Some(r.id.clone()),
            _ => None,
        })
        .collect();

    let sub = connection.subscribe();
    for message in messages {
        if connection.deliver(message).await.is_err() {
            return StatusCode::GONE.into_response();
        }
    }

    if pending.is_empty() {
        if transport.config.stateless {
            connection.close().await;
        }
        let response = StatusCode::ACCEPTED.into_response();
        return if is_new { attach_session_header(response, connection.id()) } else { response };
    }

    let wants_sse = accepts_event_stream(&headers) && !transport.config.stateless;
    let session_id = connection.id().to_string();
    let codec = transport.codec;

    let response = if wants_sse {
        let stream = futures::stream::unfold(SsePostState::Active(sub, pending), move |state| {
            let session_id = session_id.clone();
            let codec = codec;
            async move {
                let (mut rx, mut pending) = match state {
                    SsePostState::Closed => return None,
                    SsePostState::Active(rx, pending) => (rx, pending),
                };
                if pending.is_empty() {
                    return None;
                }
                loop {
                    match rx.recv().await {
                        Ok(stored) => {
                            if let Message::Response(r) = &stored.message {
                                pending.remove(&r.id);
                            }
                            let event = to_sse_event(&codec, &session_id, stored);
                            return Some((Ok(event), SsePostState::Active(rx, pending)));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "POST SSE reply lagged behind outbound broadcast, closing stream");
                            return Some((Err(HttpTransportError::StreamLagged(skipped)), SsePostState::Closed));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });
        Sse::new(stream).into_response()
    } else {
        let responses = collect_responses(sub, pending).await;
        if transport.config.stateless {
            connection.close().await;
        }
        Json(responses_to_json(responses)).into_response()
    };

    if is_new {
        attach_session_header(response, connection.id())
    } else {
        response
    }
}

async fn handle_get(State(transport): State<Arc<StreamableHttpTransport>>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_header(&headers) else {
        return (StatusCode::BAD_REQUEST, "missing Mcp-Session-Id").into_response();
    };
    let Some(connection) = transport.sessions.get(&session_id).map(|e| Arc::clone(e.value())) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let replay: Vec<StoredEvent> = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_last_event_id)
        .and_then(|(_, seq)| connection.event_store().since(session_id.as_ref(), seq))
        .unwrap_or_default();

    let sub = connection.subscribe();
    let codec = transport.codec;
    let replay_stream_id = session_id.to_string();
    let live_stream_id = session_id.to_string();

    let replay_stream = futures::stream::iter(
        replay.into_iter().map(move |ev| Ok::<_, HttpTransportError>(to_sse_event(&codec, &replay_stream_id, ev))),
    );
    let live_stream = futures::stream::unfold(SseGetState::Active(sub), move |state| {
        let stream_id = live_stream_id.clone();
        let codec = codec;
        async move {
            let mut rx = match state {
                SseGetState::Closed => return None,
                SseGetState::Active(rx) => rx,
            };
            loop {
                match rx.recv().await {
                    Ok(stored) => {
                        let event = to_sse_event(&codec, &stream_id, stored);
                        return Some((Ok(event), SseGetState::Active(rx)));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "GET stream lagged behind outbound broadcast, closing stream");
                        return Some((Err(HttpTransportError::StreamLagged(skipped)), SseGetState::Closed));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
    });

    let stream = replay_stream.chain(live_stream);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

async fn handle_delete(State(transport): State<Arc<StreamableHttpTransport>>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_header(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match transport.sessions.remove(&session_id) {
        Some((_, connection)) => {
            connection.close().await;
            StatusCode::NO_CONTENT.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn host_guard_middleware(State(guard): State<Arc<HostGuard>>, req: Request, next: Next) -> Response {
    let host = req.headers().get(axum::http::header::HOST).and_then(|v| v.to_str().ok());
    match host {
        Some(h) if guard.permits(h) => next.run(req).await,
        _ => StatusCode::FORBIDDEN.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn initialize_without_session_header_creates_a_session() {
        let (transport, mut new_sessions) = StreamableHttpTransport::new(StreamableHttpConfig::default());
        let router = transport.router();

        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}
        })
        .to_string();

        tokio::spawn(async move {
            // Mimics a real `Peer`: receive the delivered request before
            // replying, so the reply can never race ahead of the handler's
            // own `subscribe()` call.
            let (_id, connection) = new_sessions.recv().await.unwrap();
            if let Some(Message::Request(request)) = connection.recv().await.unwrap() {
                connection
                    .send(Message::Response(ferrite_mcp_wire::Response::success(
                        request.id,
                        serde_json::json!({"ok": true}),
                    )))
                    .await
                    .unwrap();
            }
        });

        let request = axum::http::Request::post("/mcp")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert!(response.headers().contains_key(MCP_SESSION_ID_HEADER));
        let value = body_json(response).await;
        assert_eq!(value["result"]["ok"], true);
    }

    #[tokio::test]
    async fn post_without_session_header_for_non_initialize_is_rejected() {
        let (transport, _rx) = StreamableHttpTransport::new(StreamableHttpConfig::default());
        let router = transport.router();
        let body = serde_json::json!({"jsonrpc": "2.0", "method": "notifications/ping"}).to_string();
        let request = axum::http::Request::post("/mcp").body(axum::body::Body::from(body)).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_on_get_is_not_found() {
        let (transport, _rx) = StreamableHttpTransport::new(StreamableHttpConfig::default());
        let router = transport.router();
        let request = axum::http::Request::get("/mcp").header(MCP_SESSION_ID_HEADER, "not-a-session").body(axum::body::Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_terminates_a_known_session() {
        let (transport, _rx) = StreamableHttpTransport::new(StreamableHttpConfig::default());
        let id = SessionId::new();
        let connection = transport.new_connection(id.clone());
        transport.sessions.insert(id.clone(), connection);
        let router = transport.router();
        let request =
            axum::http::Request::delete("/mcp").header(MCP_SESSION_ID_HEADER, id.to_string()).body(axum::body::Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!transport.sessions.contains_key(&id));
    }

    #[tokio::test]
    async fn get_stream_closes_with_error_when_subscriber_lags() {
        let config = StreamableHttpConfigBuilder::new().with_outbound_capacity(1).build();
        let (transport, _rx) = StreamableHttpTransport::new(config);
        let id = SessionId::new();
        let connection = transport.new_connection(id.clone());
        transport.sessions.insert(id.clone(), Arc::clone(&connection));
        let router = transport.router();

        let request = axum::http::Request::get("/mcp")
            .header(MCP_SESSION_ID_HEADER, id.to_string())
            .body(axum::body::Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        // The GET handler already subscribed before returning this response;
        // three sends against a capacity-1 channel guarantees the subscriber
        // lags once its stream is finally polled below.
        for i in 0..3 {
            connection
                .send(Message::Notification(ferrite_mcp_wire::Notification::new(&format!("n{i}"), None)))
                .await
                .unwrap();
        }

        let result = response.into_body().collect().await;
        assert!(result.is_err(), "a lagged subscriber should close the stream with an error, not loop forever");
    }

    #[tokio::test]
    async fn host_guard_rejects_disallowed_host() {
        let config = StreamableHttpConfigBuilder::new()
            .with_host_guard(HostGuard::new(["api.example.com".to_string()]).allow_loopback(false))
            .build();
        let (transport, _rx) = StreamableHttpTransport::new(config);
        let router = transport.router();
        let request = axum::http::Request::get("/mcp").header("host", "evil.example.com").body(axum::body::Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
