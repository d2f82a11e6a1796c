//! JSON and form body parsing stages.
//!
//! Both stages buffer the body (bounded by their own ceiling), decode it and
//! attach a [`ParsedBody`] to the request before routing. The raw bytes are
//! put back so handlers may still extract them directly. Requests with other
//! content types pass through untouched.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::config::LimitsConfig;
use crate::error::AppError;
use crate::http::middleware::form::{decode_extended, FormError};
use crate::security::limits::{check_declared_length, read_body};

/// Per-stage ceilings, taken from [`LimitsConfig`].
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub json: usize,
    pub form: usize,
}

impl From<&LimitsConfig> for BodyLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            json: config.json_body_bytes,
            form: config.form_body_bytes,
        }
    }
}

/// A decoded request body, available to handlers as an extractor.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Form(Value),
}

impl ParsedBody {
    pub fn value(&self) -> &Value {
        match self {
            ParsedBody::Json(v) | ParsedBody::Form(v) => v,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ParsedBody::Json(v) | ParsedBody::Form(v) => v,
        }
    }
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .ok_or_else(|| AppError::MalformedBody("expected a JSON or form-encoded body".into()))
    }
}

fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
    Some(essence)
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json"
        || (media_type.starts_with("application/") && media_type.ends_with("+json"))
}

fn is_form(media_type: &str) -> bool {
    media_type == "application/x-www-form-urlencoded"
}

/// Strict JSON: only objects and arrays are accepted at the top level.
pub fn parse_json(bytes: &[u8]) -> Result<Value, AppError> {
    let first = bytes.iter().find(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
    if !matches!(first, Some(b'{') | Some(b'[')) {
        return Err(AppError::MalformedBody(
            "JSON body must be an object or an array".into(),
        ));
    }
    serde_json::from_slice(bytes).map_err(|e| AppError::MalformedBody(e.to_string()))
}

/// Decode an urlencoded body with nested key support.
pub fn parse_form(bytes: &[u8]) -> Result<Value, AppError> {
    std::str::from_utf8(bytes)
        .map_err(|_| AppError::MalformedBody("form body is not valid UTF-8".into()))?;
    decode_extended(bytes).map_err(|e| match e {
        FormError::TooManyParameters => {
            AppError::Status(axum::http::StatusCode::PAYLOAD_TOO_LARGE)
        }
    })
}

async fn buffer_and_parse(
    request: Request<Body>,
    limit: usize,
    parse: fn(&[u8]) -> Result<Value, AppError>,
    wrap: fn(Value) -> ParsedBody,
) -> Result<Request<Body>, AppError> {
    check_declared_length(request.headers(), limit)?;

    let (mut parts, body) = request.into_parts();
    let bytes = read_body(body, limit).await?;

    if !bytes.is_empty() {
        let value = parse(&bytes)?;
        parts.extensions.insert(wrap(value));
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// JSON body-parsing stage.
pub async fn json_body_middleware(
    State(limits): State<BodyLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match media_type(request.headers()) {
        Some(mt) if is_json(&mt) => {
            let request = buffer_and_parse(request, limits.json, parse_json, ParsedBody::Json).await?;
            Ok(next.run(request).await)
        }
        _ => Ok(next.run(request).await),
    }
}

/// Form body-parsing stage.
pub async fn form_body_middleware(
    State(limits): State<BodyLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match media_type(request.headers()) {
        Some(mt) if is_form(&mt) => {
            let request = buffer_and_parse(request, limits.form, parse_form, ParsedBody::Form).await?;
            Ok(next.run(request).await)
        }
        _ => Ok(next.run(request).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::post, Router};
    use serde_json::json;
    use tower::ServiceExt;

    fn app(limits: BodyLimits) -> Router {
        Router::new()
            .route(
                "/echo",
                post(|body: ParsedBody| async move { axum::Json(body.into_value()) }),
            )
            .layer(middleware::from_fn_with_state(limits, form_body_middleware))
            .layer(middleware::from_fn_with_state(limits, json_body_middleware))
    }

    fn post_with(content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::post("/echo")
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    const LIMITS: BodyLimits = BodyLimits { json: 64, form: 64 };

    #[tokio::test]
    async fn json_body_reaches_handler() {
        let response = app(LIMITS)
            .oneshot(post_with("application/json; charset=utf-8", r#"{"a":[1,2]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let echoed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(echoed, json!({"a": [1, 2]}));
    }

    #[tokio::test]
    async fn oversized_json_is_rejected() {
        let body = format!(r#"{{"pad":"{}"}}"#, "x".repeat(100));
        let response = app(LIMITS)
            .oneshot(post_with("application/json", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn scalar_json_is_malformed() {
        let response = app(LIMITS)
            .oneshot(post_with("application/json", "\"just a string\""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn broken_json_is_malformed() {
        let response = app(LIMITS)
            .oneshot(post_with("application/vnd.api+json", "{\"a\":"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn form_body_is_decoded() {
        let response = app(LIMITS)
            .oneshot(post_with("application/x-www-form-urlencoded", "a[b]=1&c=2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let echoed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(echoed, json!({"a": {"b": "1"}, "c": "2"}));
    }

    #[tokio::test]
    async fn other_content_types_pass_through() {
        let response = app(LIMITS)
            .oneshot(post_with("text/plain", "x".repeat(200)))
            .await
            .unwrap();
        // Reaches the handler, which then finds no parsed body.
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
