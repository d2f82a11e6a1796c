//! Request identification and accounting.
//!
//! Every request gets an `x-request-id` (kept from the client if present,
//! otherwise a UUID v4) before anything else runs, and the same id is echoed
//! on the response.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, Request},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer assigning ids to incoming requests.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer copying the request id onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Access to the request id header.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers().get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

/// Records request count and latency per method and status.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn ids_are_generated_and_echoed() {
        let app = Router::new()
            .route(
                "/",
                get(|request: Request<Body>| async move {
                    request.request_id().unwrap_or_default().to_string()
                }),
            )
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let echoed = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(uuid::Uuid::parse_str(&echoed).is_ok());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, echoed.as_bytes());
    }

    #[tokio::test]
    async fn client_ids_are_kept() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer());

        let response = app
            .oneshot(
                Request::get("/")
                    .header(X_REQUEST_ID, "client-chosen")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "client-chosen");
    }
}
