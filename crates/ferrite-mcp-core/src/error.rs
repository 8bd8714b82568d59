use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The JSON-RPC 2.0 error codes this runtime can produce, plus the
/// MCP-specific extensions layered on top of them. `code()` gives the wire
/// value; callers needing a different taxonomy should match on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
    /// A request was cancelled via `notifications/cancelled` before it
    /// produced a response. Never sent as a JSON-RPC response body — a
    /// cancelled call slot is dropped, not answered.
    Cancelled,
    /// The peer is not yet initialized (or already closed) and the method
    /// called requires the `Ready` state.
    NotReady,
    /// Bearer token missing, expired, or otherwise unusable.
    Unauthorized,
    /// Bearer token valid but lacking a required scope.
    Forbidden,
}

impl ErrorKind {
    /// The JSON-RPC 2.0 wire error code for this kind.
    pub const fn code(self) -> i64 {
        match self {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams => -32602,
            ErrorKind::Internal => -32603,
            ErrorKind::Cancelled => -32800,
            ErrorKind::NotReady => -32801,
            ErrorKind::Unauthorized => -32001,
            ErrorKind::Forbidden => -32003,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            -32700 => ErrorKind::ParseError,
            -32600 => ErrorKind::InvalidRequest,
            -32601 => ErrorKind::MethodNotFound,
            -32602 => ErrorKind::InvalidParams,
            -32603 => ErrorKind::Internal,
            -32800 => ErrorKind::Cancelled,
            -32801 => ErrorKind::NotReady,
            -32001 => ErrorKind::Unauthorized,
            -32003 => ErrorKind::Forbidden,
            _ => return None,
        })
    }
}

/// The one error type every `ferrite-mcp-*` crate returns. Carries an
/// [`ErrorKind`] for callers that branch on the wire code, a human-readable
/// message, and optional structured `data` to attach to the JSON-RPC error
/// object.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct McpError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl McpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(
            ErrorKind::MethodNotFound,
            format!("method not found: {method}"),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "request cancelled")
    }

    pub fn not_ready() -> Self {
        Self::new(ErrorKind::NotReady, "peer is not ready")
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::new(ErrorKind::ParseError, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips() {
        for kind in [
            ErrorKind::ParseError,
            ErrorKind::InvalidRequest,
            ErrorKind::MethodNotFound,
            ErrorKind::InvalidParams,
            ErrorKind::Internal,
            ErrorKind::Cancelled,
            ErrorKind::NotReady,
            ErrorKind::Unauthorized,
            ErrorKind::Forbidden,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
    }
}
