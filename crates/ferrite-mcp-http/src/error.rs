use ferrite_mcp_transport_traits::ConnectionError;
use thiserror::Error;

/// Errors this transport can hit handling a single HTTP request. Mapped to
/// an HTTP status by the handler that catches it, not surfaced to a `Peer`.
#[derive(Debug, Error)]
pub enum HttpTransportError {
    #[error("malformed JSON-RPC message: {0}")]
    Codec(#[from] ferrite_mcp_wire::CodecError),
    #[error("unknown or expired session")]
    UnknownSession,
    #[error("missing Mcp-Session-Id header")]
    MissingSession,
    #[error("host {0:?} is not in the allow-list")]
    HostNotAllowed(String),
    #[error("session is not accepting new requests")]
    SessionClosed,
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("stream lagged behind outbound broadcast by {0} messages; reconnect with Last-Event-ID")]
    StreamLagged(u64),
}
