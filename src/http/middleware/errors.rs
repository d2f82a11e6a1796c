//! Terminal error-handling stage.
//!
//! Wraps the whole pipeline, so it sees the final response of every other
//! stage. Error responses that already carry an [`AppError`] are re-rendered
//! with the request id; bare error responses produced by framework layers
//! (timeouts, method routing, panics) are mapped into the same shape. The
//! headers set by inner stages are kept.

use std::any::Any;

use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::http::request::RequestIdExt;
use crate::observability::metrics;

pub async fn error_stage_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request.request_id().map(str::to_owned);
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let (mut parts, _discarded) = response.into_parts();
    let error = parts
        .extensions
        .remove::<AppError>()
        .unwrap_or_else(|| AppError::from_status(status));

    if status.is_server_error() {
        tracing::error!(
            request_id = request_id.as_deref().unwrap_or("unknown"),
            method = %method,
            path = %path,
            status = status.as_u16(),
            error = %error,
            "Request failed"
        );
    } else {
        tracing::debug!(
            request_id = request_id.as_deref().unwrap_or("unknown"),
            method = %method,
            path = %path,
            status = status.as_u16(),
            error = %error,
            "Request rejected"
        );
    }
    metrics::record_error(&error.code());

    let (rendered, body) = error.render(request_id.as_deref()).into_parts();

    // The original body is gone; its framing headers must go with it.
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_ENCODING);
    parts.headers.remove(header::TRANSFER_ENCODING);
    for (name, value) in rendered.headers.iter() {
        parts.headers.insert(name.clone(), value.clone());
    }
    parts.extensions.insert(error);

    Response::from_parts(parts, body)
}

/// Response for a panicking handler, used with `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}
