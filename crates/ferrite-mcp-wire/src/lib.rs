//! Wire-level JSON-RPC 2.0 message types and a strict codec.
//!
//! The codec enforces one rule the `serde_json` default does not: a JSON
//! object that repeats a key is rejected rather than silently resolved to
//! its last occurrence. Accepting last-value-wins here would let an
//! attacker smuggle a second `"method"` or `"id"` past anything that only
//! inspects the first occurrence of a key (e.g. a WAF, a logging middleware)
//! while the real decoder picks up the other one.

mod codec;
mod message;

pub use codec::{Codec, CodecError, JsonCodec};
pub use message::{JsonRpcError, Message, Notification, Request, RequestId, Response};

/// The JSON-RPC 2.0 `"jsonrpc"` field value every message carries.
pub const JSONRPC_VERSION: &str = "2.0";

impl From<CodecError> for ferrite_mcp_core::McpError {
    fn from(e: CodecError) -> Self {
        let kind = match e {
            CodecError::Syntax(_) => ferrite_mcp_core::ErrorKind::ParseError,
            CodecError::DuplicateKey { .. } => ferrite_mcp_core::ErrorKind::ParseError,
            CodecError::NotAMessage(_) => ferrite_mcp_core::ErrorKind::InvalidRequest,
            CodecError::TooLarge { .. } => ferrite_mcp_core::ErrorKind::InvalidRequest,
        };
        ferrite_mcp_core::McpError::new(kind, e.to_string())
    }
}
