use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recall_memory::{ErrorKind, MemoryError};
use thiserror::Error;

use crate::handlers::ApiResponse;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// HTTP status for an error class.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateKey => StatusCode::CONFLICT,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ProviderUnavailable
        | ErrorKind::ProviderError
        | ErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::DimensionMismatch
        | ErrorKind::ConnectionError
        | ErrorKind::SchemaError
        | ErrorKind::StatsUnavailable
        | ErrorKind::Engine => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A service failure rendered as `{success: false, message}`.
///
/// Only the fixed message for the error class reaches the caller; the cause is logged.
#[derive(Debug)]
pub struct ApiError(pub MemoryError);

impl From<MemoryError> for ApiError {
    fn from(err: MemoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!("{} stage failed: {:#}", self.0.stage(), self.0);
        } else {
            tracing::debug!("request rejected: {:#}", self.0);
        }
        let body: ApiResponse<()> = ApiResponse::failure(kind.public_message());
        (status, Json(body)).into_response()
    }
}
