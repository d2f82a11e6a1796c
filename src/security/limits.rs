//! Request body limits.
//!
//! The declared `Content-Length` is checked before any byte is read; the
//! running total is checked again while buffering so chunked bodies cannot
//! slip past the ceiling.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tokio::sync::Semaphore;

use crate::error::AppError;
use crate::observability::metrics;

/// Declared body length, if the client sent a parseable `Content-Length`.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Reject early when the declared length is already above `limit`.
pub fn check_declared_length(headers: &HeaderMap, limit: usize) -> Result<(), AppError> {
    match declared_length(headers) {
        Some(len) if len > limit as u64 => {
            metrics::record_body_rejected("declared_length");
            Err(AppError::PayloadTooLarge { limit })
        }
        _ => Ok(()),
    }
}

/// Buffer `body`, failing as soon as more than `limit` bytes arrive.
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, AppError> {
    let mut stream = body.into_data_stream();
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| AppError::MalformedBody(format!("failed to read body: {e}")))?;
        if buffer.len() + chunk.len() > limit {
            metrics::record_body_rejected("streamed_length");
            return Err(AppError::PayloadTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffer))
}

/// Caps concurrently processed requests. Excess requests wait for a slot.
pub async fn in_flight_limit_middleware(
    State(slots): State<Arc<Semaphore>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _permit = match slots.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return AppError::Status(StatusCode::SERVICE_UNAVAILABLE).into_response();
        }
    };
    next.run(request).await
}
