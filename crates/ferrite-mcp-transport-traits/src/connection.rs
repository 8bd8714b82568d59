use async_trait::async_trait;
use ferrite_mcp_wire::Message;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("wire codec error: {0}")]
    Codec(#[from] ferrite_mcp_wire::CodecError),
    #[error("io error: {0}")]
    Io(String),
}

/// A bidirectional, message-oriented pipe to a peer. A `Peer` (in
/// `ferrite-mcp-protocol`) owns one of these and has no knowledge of
/// whether it's backed by stdio, streamable HTTP, or two in-process queues.
///
/// `send`/`recv` operate on whole [`Message`]s, not bytes — framing and
/// wire-codec concerns live entirely inside the implementation.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn send(&self, message: Message) -> Result<(), ConnectionError>;

    /// Returns `Ok(None)` exactly once, when the peer has cleanly closed the
    /// connection (EOF, DELETE on the HTTP session, channel drop). Further
    /// calls after that should keep returning `Ok(None)` rather than erroring.
    async fn recv(&self) -> Result<Option<Message>, ConnectionError>;

    async fn close(&self);
}
