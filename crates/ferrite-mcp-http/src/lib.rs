//! Streamable HTTP transport: a single endpoint exposing POST (send a
//! batch of messages, get a JSON or SSE reply), GET (long-poll SSE push,
//! resumable via `Last-Event-ID`), and DELETE (terminate a session).
//!
//! Like `ferrite-mcp-stdio`, this crate speaks only the `Connection` trait
//! from `ferrite-mcp-transport-traits` — it has no knowledge of `Peer`.
//! [`StreamableHttpTransport::new`] hands back a channel of newly-created
//! per-session connections for the caller to wire into the protocol layer.

mod connection;
mod error;
mod event_store;
mod host_guard;
mod server;
mod session;

pub use connection::HttpSessionConnection;
pub use error::HttpTransportError;
pub use event_store::{parse_last_event_id, EventStore, StoredEvent};
pub use host_guard::HostGuard;
pub use server::{
    StreamableHttpConfig, StreamableHttpConfigBuilder, StreamableHttpTransport, DEFAULT_ENDPOINT_PATH,
    MCP_SESSION_ID_HEADER,
};
pub use session::SessionId;
