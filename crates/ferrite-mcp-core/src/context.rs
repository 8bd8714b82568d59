use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a handler needs about the request it's servicing beyond its
/// typed arguments: a cancellation token that fires when the peer sends
/// `notifications/cancelled` for this request id, an optional progress
/// token to report against, and the id itself for logging/correlation.
///
/// Cancellation is first-class here rather than ambient: a handler that
/// never checks `ctx.cancelled()` simply runs to completion, which is the
/// correct default for handlers that don't support partial cancellation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Arc<str>,
    cancellation: CancellationToken,
    progress_token: Option<Arc<str>>,
    peer_id: Arc<str>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<Arc<str>>, peer_id: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: request_id.into(),
            cancellation: CancellationToken::new(),
            progress_token: None,
            peer_id: peer_id.into(),
        }
    }

    pub fn with_progress_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.progress_token = Some(token.into());
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn progress_token(&self) -> Option<&str> {
        self.progress_token.as_deref()
    }

    /// The token to pass into long-running handler internals (e.g. a tool
    /// that loops, or an outbound HTTP call made with `select!`).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Called by the dispatching `Peer` when a matching
    /// `notifications/cancelled` arrives. Idempotent.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_through_clones() {
        let ctx = RequestContext::new("1", "peer-a");
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn progress_token_round_trips() {
        let ctx = RequestContext::new("1", "peer-a").with_progress_token("tok-1");
        assert_eq!(ctx.progress_token(), Some("tok-1"));
    }
}
