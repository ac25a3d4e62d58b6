use thiserror::Error;

/// Why a real-time command was rejected. Rendered back to the sender as an
/// `error` event.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}
