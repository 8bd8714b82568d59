use thiserror::Error;

/// Errors the convenience runtime layer can raise building or driving a
/// server/client, on top of whatever the underlying crate returns.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Server(#[from] ferrite_mcp_server::ServerError),
    #[error("dispatch loop ended unexpectedly: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
