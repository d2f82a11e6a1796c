//! Per-request error taxonomy and the uniform client-facing error body.
//!
//! Every error response leaving the server has the shape
//!
//! ```json
//! {"error": {"status": 413, "code": "payload_too_large", "message": "..."}, "request_id": "..."}
//! ```
//!
//! `request_id` is only present once the error stage has seen the request.

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors a request can end in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("resource not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("request timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{}", .0.canonical_reason().unwrap_or("request failed"))]
    Status(StatusCode),
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorDetail<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    status: u16,
    code: &'a str,
    message: String,
}

impl AppError {
    /// Map a bare status produced by a framework layer into the taxonomy.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge { limit: 0 },
            StatusCode::NOT_FOUND => AppError::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => AppError::MethodNotAllowed,
            StatusCode::REQUEST_TIMEOUT => AppError::Timeout,
            other => AppError::Status(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Status(status) => *status,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> String {
        match self {
            AppError::PayloadTooLarge { .. } => "payload_too_large".into(),
            AppError::MalformedBody(_) => "malformed_body".into(),
            AppError::NotFound => "not_found".into(),
            AppError::MethodNotAllowed => "method_not_allowed".into(),
            AppError::Timeout => "request_timeout".into(),
            AppError::Internal(_) => "internal_error".into(),
            AppError::Status(status) => status
                .canonical_reason()
                .unwrap_or("error")
                .to_ascii_lowercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        }
    }

    /// Message shown to clients. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::PayloadTooLarge { limit: 0 } => "request body too large".into(),
            AppError::Internal(_) => "internal server error".into(),
            AppError::Status(status) if status.is_server_error() => {
                status.canonical_reason().unwrap_or("server error").to_string()
            }
            other => other.to_string(),
        }
    }

    /// Render the uniform error response.
    pub fn render(&self, request_id: Option<&str>) -> Response {
        let code = self.code();
        let envelope = ErrorEnvelope {
            error: ErrorDetail {
                status: self.status().as_u16(),
                code: &code,
                message: self.public_message(),
            },
            request_id,
        };

        let body = serde_json::to_vec(&envelope).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.extensions_mut().insert(self.clone());
        response
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(None)
    }
}
