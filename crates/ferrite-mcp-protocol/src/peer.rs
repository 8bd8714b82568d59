use crate::call::{CallError, CallOptions, CallSlot, ProgressSink};
use crate::middleware::Middleware;
use crate::negotiation::NegotiationState;
use async_trait::async_trait;
use dashmap::DashMap;
use ferrite_mcp_core::{McpError, RequestContext};
use ferrite_mcp_transport_traits::Connection;
use ferrite_mcp_wire::{JsonRpcError, Message, Notification, Request, RequestId, Response, ResponseOutcome};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handles one inbound request. The default `Peer` constructed by
/// `ferrite-mcp-server`/`ferrite-mcp-client` installs a handler that routes
/// by method name into tool/resource/prompt or roots/sampling/elicitation
/// registries; a bare `Peer` answers every request with `MethodNotFound`.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: RequestContext,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, McpError>;
}

/// Handles one inbound notification other than `notifications/cancelled`,
/// which the `Peer` intercepts itself.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, method: &str, params: Option<Value>);
}

struct NoopRequestHandler;

#[async_trait]
impl RequestHandler for NoopRequestHandler {
    async fn handle(
        &self,
        _ctx: RequestContext,
        method: &str,
        _params: Option<Value>,
    ) -> Result<Value, McpError> {
        Err(McpError::method_not_found(method))
    }
}

struct NoopNotificationHandler;

#[async_trait]
impl NotificationHandler for NoopNotificationHandler {
    async fn handle(&self, _method: &str, _params: Option<Value>) {}
}

/// A single bidirectional MCP endpoint. Owns the transport [`Connection`],
/// the outbound call-slot table, the inbound-cancellation table, the
/// negotiation state machine, and the handler/middleware chain that
/// services requests the peer sends us.
///
/// There is deliberately one `Peer` type for both roles (see `SPEC_FULL.md`
/// Design Notes) — a server and a client differ only in which
/// `RequestHandler` gets installed and which capabilities get advertised
/// during `initialize`.
pub struct Peer {
    id: Arc<str>,
    connection: Arc<dyn Connection>,
    call_slots: Arc<DashMap<RequestId, CallSlot>>,
    incoming_cancel_tokens: Arc<DashMap<RequestId, CancellationToken>>,
    progress_sinks: Arc<DashMap<String, ProgressSink>>,
    next_id: AtomicI64,
    state: Arc<RwLock<NegotiationState>>,
    handler: Arc<dyn RequestHandler>,
    notification_handler: Arc<dyn NotificationHandler>,
    middleware: Arc<Vec<Arc<dyn Middleware>>>,
}

pub struct PeerBuilder {
    id: Option<Arc<str>>,
    handler: Option<Arc<dyn RequestHandler>>,
    notification_handler: Option<Arc<dyn NotificationHandler>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Default for PeerBuilder {
    fn default() -> Self {
        Self {
            id: None,
            handler: None,
            notification_handler: None,
            middleware: Vec::new(),
        }
    }
}

impl PeerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn request_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn notification_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.notification_handler = Some(handler);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn build(self, connection: Arc<dyn Connection>) -> Arc<Peer> {
        Arc::new(Peer {
            id: self.id.unwrap_or_else(|| Arc::from(uuid::Uuid::new_v4().to_string())),
            connection,
            call_slots: Arc::new(DashMap::new()),
            incoming_cancel_tokens: Arc::new(DashMap::new()),
            progress_sinks: Arc::new(DashMap::new()),
            next_id: AtomicI64::new(1),
            state: Arc::new(RwLock::new(NegotiationState::Uninitialized)),
            handler: self.handler.unwrap_or_else(|| Arc::new(NoopRequestHandler)),
            notification_handler: self
                .notification_handler
                .unwrap_or_else(|| Arc::new(NoopNotificationHandler)),
            middleware: Arc::new(self.middleware),
        })
    }
}

impl Peer {
    pub fn builder() -> PeerBuilder {
        PeerBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.read()
    }

    /// Advance the negotiation state machine. Rejects any transition that
    /// isn't a valid forward move (see [`NegotiationState::can_transition_to`]).
    pub fn set_state(&self, next: NegotiationState) -> Result<(), McpError> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(McpError::internal(format!(
                "invalid negotiation transition {state:?} -> {next:?}"
            )));
        }
        *state = next;
        Ok(())
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate the id the next unparented [`Peer::call`] would use, without
    /// making the call. Lets a caller learn the id ahead of time so it can
    /// hand it to [`Peer::cancel_call`] (or `opts.id` on `call` itself)
    /// concurrently with the call that uses it.
    pub fn allocate_request_id(&self) -> RequestId {
        self.next_request_id()
    }

    /// Send a request and await its correlated response. `opts.deadline`
    /// and `opts.cancel_when` both resolve the call the same way
    /// [`Peer::cancel_call`] does: the slot is dropped and a
    /// `notifications/cancelled` is sent to the remote side. Dropping the
    /// returned future before it resolves leaves the call slot in place —
    /// callers that want to abandon a call should cancel it explicitly so
    /// the peer learns about it too.
    pub async fn call(&self, method: &str, params: Option<Value>, opts: CallOptions) -> Result<Value, CallError> {
        let id = opts.id.unwrap_or_else(|| self.next_request_id());
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        self.call_slots.insert(
            id.clone(),
            CallSlot {
                waiter: tx,
                method: method.to_string(),
                started_at: std::time::Instant::now(),
                cancel: cancel.clone(),
            },
        );

        if let Some(external) = opts.cancel_when {
            let relay = cancel.clone();
            tokio::spawn(async move {
                external.cancelled().await;
                relay.cancel();
            });
        }
        if let Some(deadline) = opts.deadline {
            let relay = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                relay.cancel();
            });
        }

        let request = Request::new(id.clone(), method, params);
        if let Err(e) = self.connection.send(Message::Request(request)).await {
            self.call_slots.remove(&id);
            return Err(CallError::Transport(e));
        }

        tokio::select! {
            result = rx => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(err.into()),
                Err(_) => Err(CallError::ConnectionClosed),
            },
            _ = cancel.cancelled() => {
                self.call_slots.remove(&id);
                let _ = self
                    .connection
                    .send(Message::Notification(Notification::new(
                        "notifications/cancelled",
                        Some(serde_json::json!({ "requestId": id })),
                    )))
                    .await;
                Err(CallError::Cancelled)
            }
        }
    }

    /// Like [`Peer::call`], but also returns a receiver of
    /// `notifications/progress` values the peer reports against a
    /// progress token attached to this call.
    pub async fn call_with_progress(
        &self,
        method: &str,
        mut params: Option<Value>,
        progress_capacity: usize,
        opts: CallOptions,
    ) -> Result<(Value, mpsc::Receiver<Value>), CallError> {
        let token = uuid::Uuid::new_v4().to_string();
        let meta = serde_json::json!({ "progressToken": token });
        match params.as_mut() {
            Some(Value::Object(map)) => {
                map.insert("_meta".to_string(), meta);
            }
            _ => params = Some(serde_json::json!({ "_meta": meta })),
        }

        let (tx, rx) = mpsc::channel(progress_capacity.max(1));
        self.progress_sinks.insert(token.clone(), tx);
        let result = self.call(method, params, opts).await;
        self.progress_sinks.remove(&token);
        result.map(|value| (value, rx))
    }

    /// Cancel an outbound call this peer is still waiting on, sending
    /// `notifications/cancelled` to the remote side.
    pub fn cancel_call(&self, id: &RequestId) {
        if let Some(slot) = self.call_slots.get(id) {
            slot.cancel.cancel();
        }
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), CallError> {
        self.connection
            .send(Message::Notification(Notification::new(method, params)))
            .await
            .map_err(CallError::Transport)
    }

    /// Drive the client side of the handshake: send `initialize`, move to
    /// `Ready` on success, then fire `notifications/initialized`. Mirrors
    /// what a server peer does on its side in `handle_request`/
    /// `handle_notification`.
    pub async fn perform_client_handshake(&self, params: Value) -> Result<Value, CallError> {
        self.set_state(NegotiationState::Initializing)
            .map_err(|e| CallError::Remote(e.kind.code(), e.message))?;
        let result = self.call("initialize", Some(params), CallOptions::default()).await?;
        self.set_state(NegotiationState::Ready)
            .map_err(|e| CallError::Remote(e.kind.code(), e.message))?;
        self.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// Spawn the dispatch loop: reads messages from the connection until it
    /// closes, routing responses to call slots and requests/notifications
    /// to the installed handlers.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.connection.recv().await {
                    Ok(Some(message)) => {
                        let this = Arc::clone(&self);
                        tokio::spawn(async move { this.dispatch(message).await });
                    }
                    Ok(None) => {
                        debug!(peer = %self.id, "connection closed, stopping dispatch loop");
                        break;
                    }
                    Err(e) => {
                        warn!(peer = %self.id, error = %e, "transport error, stopping dispatch loop");
                        break;
                    }
                }
            }
        })
    }

    async fn dispatch(&self, message: Message) {
        match message {
            Message::Response(resp) => self.complete_call(resp),
            Message::Request(req) => self.handle_request(req).await,
            Message::Notification(note) => self.handle_notification(note).await,
        }
    }

    fn complete_call(&self, resp: Response) {
        if let Some((_, slot)) = self.call_slots.remove(&resp.id) {
            let result = match resp.outcome {
                ResponseOutcome::Result { result } => Ok(result),
                ResponseOutcome::Error { error } => Err(error),
            };
            let _ = slot.waiter.send(result);
        }
    }

    async fn handle_request(&self, req: Request) {
        let state = self.state();
        if !state.allows(&req.method) {
            self.respond_error(
                req.id,
                JsonRpcError {
                    code: McpError::not_ready().kind.code(),
                    message: "peer is not ready".to_string(),
                    data: None,
                },
            )
            .await;
            return;
        }

        if req.method == "initialize" && state == NegotiationState::Uninitialized {
            // A server peer enters `Initializing` the moment the handshake
            // request arrives; it moves to `Ready` once the matching
            // `notifications/initialized` comes in (see `handle_notification`).
            let _ = self.set_state(NegotiationState::Initializing);
        }

        let cancel = CancellationToken::new();
        self.incoming_cancel_tokens.insert(req.id.clone(), cancel.clone());

        let mut ctx = RequestContext::new(req.id.to_string(), self.id.to_string());
        if let Some(token) = progress_token(&req.params) {
            ctx = ctx.with_progress_token(token);
        }

        for mw in self.middleware.iter() {
            if let Err(e) = mw.before_request(&ctx, &req.method, &req.params).await {
                self.incoming_cancel_tokens.remove(&req.id);
                self.respond_error(
                    req.id,
                    JsonRpcError {
                        code: e.kind.code(),
                        message: e.message,
                        data: e.data,
                    },
                )
                .await;
                return;
            }
        }

        let result = tokio::select! {
            result = self.handler.handle(ctx.clone(), &req.method, req.params.clone()) => result,
            _ = cancel.cancelled() => Err(McpError::cancelled()),
        };

        for mw in self.middleware.iter().rev() {
            mw.after_response(&ctx, &req.method, &result).await;
        }

        self.incoming_cancel_tokens.remove(&req.id);

        if matches!(result, Err(ref e) if e.kind == ferrite_mcp_core::ErrorKind::Cancelled) {
            // A cancelled request gets no response at all, per spec.
            return;
        }

        match result {
            Ok(value) => {
                let _ = self
                    .connection
                    .send(Message::Response(Response::success(req.id, value)))
                    .await;
            }
            Err(e) => {
                self.respond_error(
                    req.id,
                    JsonRpcError {
                        code: e.kind.code(),
                        message: e.message,
                        data: e.data,
                    },
                )
                .await;
            }
        }
    }

    async fn respond_error(&self, id: RequestId, error: JsonRpcError) {
        let _ = self
            .connection
            .send(Message::Response(Response::failure(id, error)))
            .await;
    }

    async fn handle_notification(&self, note: Notification) {
        match note.method.as_str() {
            "notifications/initialized" => {
                if self.state() == NegotiationState::Initializing {
                    let _ = self.set_state(NegotiationState::Ready);
                }
            }
            "notifications/cancelled" => {
                if let Some(id) = note
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .and_then(request_id_from_value)
                {
                    if let Some((_, token)) = self.incoming_cancel_tokens.remove(&id) {
                        token.cancel();
                    }
                }
            }
            "notifications/progress" => {
                if let Some(params) = &note.params {
                    if let Some(token) = params.get("progressToken").and_then(Value::as_str) {
                        if let Some(sink) = self.progress_sinks.get(token) {
                            let _ = sink.send(params.clone()).await;
                        }
                    }
                }
            }
            _ => self.notification_handler.handle(&note.method, note.params).await,
        }
    }
}

fn progress_token(params: &Option<Value>) -> Option<String> {
    params
        .as_ref()?
        .get("_meta")?
        .get("progressToken")?
        .as_str()
        .map(str::to_string)
}

fn request_id_from_value(value: &Value) -> Option<RequestId> {
    match value {
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        Value::String(s) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}
