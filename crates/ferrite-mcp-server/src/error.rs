use ferrite_mcp_core::McpError;
use thiserror::Error;

/// Errors a tool/resource/prompt handler or the registry dispatching to it
/// can raise. Converted to an [`McpError`] (and from there to a JSON-RPC
/// error object) at the `Peer` boundary — handlers never construct wire
/// error codes directly.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl From<ServerError> for McpError {
    fn from(e: ServerError) -> Self {
        match e {
            ServerError::NotFound(msg) => McpError::invalid_params(msg),
            ServerError::InvalidInput(msg) => McpError::invalid_params(msg),
            ServerError::Internal(msg) => McpError::internal(msg),
        }
    }
}
