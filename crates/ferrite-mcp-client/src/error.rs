use ferrite_mcp_protocol::CallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client must call initialize() before making other requests")]
    NotInitialized,
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
