use ferrite_mcp_wire::{JsonRpcError, RequestId};
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("request cancelled")]
    Cancelled,
    #[error("peer returned an error: {0} ({1})")]
    Remote(i64, String),
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("transport error: {0}")]
    Transport(#[from] ferrite_mcp_transport_traits::ConnectionError),
}

impl From<JsonRpcError> for CallError {
    fn from(e: JsonRpcError) -> Self {
        CallError::Remote(e.code, e.message)
    }
}

/// Bookkeeping for one outstanding outbound request: the waiter gets
/// completed exactly once, either by a matching [`Response`](ferrite_mcp_wire::Response)
/// arriving or by the call being cancelled.
pub(crate) struct CallSlot {
    pub waiter: oneshot::Sender<Result<Value, JsonRpcError>>,
    pub method: String,
    pub started_at: Instant,
    pub cancel: CancellationToken,
}

/// Where a peer routes `notifications/progress` updates for requests it is
/// itself waiting on. A caller of [`Peer::call_with_progress`] gets the
/// receiving half; the `Peer` holds the sending half keyed by progress
/// token.
pub type ProgressSink = mpsc::Sender<Value>;

/// Per-call options for [`Peer::call`]: an externally supplied id (so the
/// caller can cancel a call it hasn't seen the response to yet), an external
/// cancellation signal, and a deadline. A deadline expiry and `cancel_when`
/// firing both resolve the call the same way [`Peer::cancel_call`] does.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub id: Option<RequestId>,
    pub cancel_when: Option<CancellationToken>,
    pub deadline: Option<Duration>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn cancel_when(mut self, token: CancellationToken) -> Self {
        self.cancel_when = Some(token);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
