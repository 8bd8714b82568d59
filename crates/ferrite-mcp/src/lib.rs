//! The facade: re-exports every crate in the workspace plus a small
//! convenience layer — [`ServerRuntime`] for wiring tools/resources/prompts
//! to a transport, and (with the `http`+`auth` features) a bearer-gate
//! middleware for the streamable HTTP server.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ferrite_mcp::ServerRuntime;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = ServerRuntime::new("demo-server", "0.1.0");
//! runtime.run_stdio().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod server;

#[cfg(feature = "http")]
mod http;

#[cfg(all(feature = "http", feature = "auth"))]
mod auth;

pub use error::{RuntimeError, RuntimeResult};
pub use server::ServerRuntime;

#[cfg(feature = "http")]
pub use http::serve_http_sessions;

#[cfg(all(feature = "http", feature = "auth"))]
pub use auth::with_bearer_gate;

pub use ferrite_mcp_client::{Client, ClientBuilder, ClientError, ClientResult};
pub use ferrite_mcp_core::{ErrorKind, McpError, RequestContext};
pub use ferrite_mcp_protocol::{CallError, CallOptions, NegotiationState, Peer, PeerBuilder};
pub use ferrite_mcp_server::{
    McpServer, PromptHandler, ResourceHandler, ServerError, ServerResult, ToolHandler, PROTOCOL_VERSION,
};
pub use ferrite_mcp_stdio::StdioConnection;
pub use ferrite_mcp_transport_traits::{memory_pair, Connection, ConnectionError};
pub use ferrite_mcp_types as types;

#[cfg(feature = "http")]
pub use ferrite_mcp_http::{
    HostGuard, SessionId, StreamableHttpConfig, StreamableHttpConfigBuilder, StreamableHttpTransport,
};

#[cfg(feature = "auth")]
pub use ferrite_mcp_auth::{
    BearerAuthConfig, BearerAuthConfigBuilder, BearerGate, ClientRegistrationMode, OAuthClientConfig,
    OAuthClientConfigBuilder, OAuthHandshake, Rejection, TokenInfo, TokenVerifier,
};
