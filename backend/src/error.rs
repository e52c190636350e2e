//! Error types for payment backends.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend answered with an error payload; `message` is verbatim.
    #[error("{backend} API: {message}")]
    Api {
        backend: &'static str,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("backend configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Transport(format!("request timed out: {e}"))
        } else if e.is_connect() {
            BackendError::Transport(format!("connection failed: {e}"))
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}
