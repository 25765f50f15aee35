//! Mapping from [`ClipiaError`] to HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use crate::error::{ClipiaError, ErrorKind};

/// Status code for each error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Processing => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler error: logs the full error, sends only the kind and a sanitized message
#[derive(Debug)]
pub struct ApiError {
    error: ClipiaError,
    not_found_message: Option<&'static str>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Use a route-specific message for 404s, e.g. "Video not found."
    pub fn with_not_found_message(mut self, message: &'static str) -> Self {
        self.not_found_message = Some(message);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<ClipiaError> for ApiError {
    fn from(error: ClipiaError) -> Self {
        Self {
            error,
            not_found_message: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.error.kind();
        let status = status_for(kind);

        if status.is_server_error() {
            error!(kind = kind.as_str(), "Request failed: {}", self.error);
        } else {
            debug!(kind = kind.as_str(), "Request rejected: {}", self.error);
        }

        let message = match (kind, self.not_found_message) {
            (ErrorKind::NotFound, Some(message)) => message.to_string(),
            _ => self.error.client_message(),
        };

        let body = json!({
            "success": false,
            "error": kind.as_str(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
