//! The `Peer`: a single bidirectional JSON-RPC endpoint. Both the server
//! role and the client role are built from the same `Peer` — the only
//! difference is which [`RequestHandler`]/[`NotificationHandler`] gets
//! installed and which default capabilities get negotiated. See
//! `ferrite-mcp-server` and `ferrite-mcp-client`.

mod call;
mod middleware;
mod negotiation;
mod peer;

pub use call::{CallError, CallOptions, ProgressSink};
pub use middleware::Middleware;
pub use negotiation::NegotiationState;
pub use peer::{NotificationHandler, Peer, PeerBuilder, RequestHandler};

pub use ferrite_mcp_core::RequestContext;
pub use ferrite_mcp_wire::{Notification, Request, RequestId, Response};
