//! HTTP error types.
//!
//! Every error is rendered as the LNURL error document
//! `{"status":"ERROR","reason":"..."}` so wallets can show the reason.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use prism_splits::SplitError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{0} does not exist")]
    SplitNotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("metrics are disabled")]
    MetricsDisabled,

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::SplitNotFound(_) | Self::MetricsDisabled => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Split(e) => match e {
                SplitError::UnknownIncoming(_)
                | SplitError::UnknownTarget(_)
                | SplitError::UnknownSplit(_) => StatusCode::NOT_FOUND,
                SplitError::AlreadySettled { .. } | SplitError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                SplitError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                SplitError::Backend(_) | SplitError::Payment(_) => StatusCode::BAD_GATEWAY,
                e if e.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = serde_json::json!({
            "status": "ERROR",
            "reason": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
