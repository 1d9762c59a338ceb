//! Mapping of failures to JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::daemon::EngineError;
use crate::service::RestartError;

/// Any failure a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Restart(#[from] RestartError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Engine(e) => match e {
                EngineError::InvalidFieldValue { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::BackupNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::BackupCorrupted { .. } => StatusCode::CONFLICT,
                EngineError::ConfigUnreadable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::WriteFailed { .. }
                | EngineError::BackupWriteFailed { .. }
                | EngineError::BackupStoreIo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Restart(RestartError::AlreadyRunning) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engine(e) => e.kind(),
            Self::Restart(RestartError::AlreadyRunning) => "restart_already_running",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        } else {
            tracing::warn!(error = %self, kind = self.kind(), "Request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
