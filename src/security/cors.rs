//! Cross-origin policy.
//!
//! Exactly one origin (the configured frontend) may call the API, with
//! credentials. Requests from any other origin are still served but carry no
//! `Access-Control-Allow-*` headers, so browsers refuse to expose them.

use axum::http::HeaderValue;
use tower_http::cors::{AllowCredentials, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use url::Url;

use crate::config::CorsConfig;

/// Reduce a configured URL to its serialized origin (`scheme://host[:port]`).
pub fn normalize_origin(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("'{raw}' is not a URL: {e}"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.host_str().is_none() {
        return Err(format!("'{raw}' has no host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!("'{raw}' must be a bare origin without path, query or fragment"));
    }

    Ok(url.origin().ascii_serialization())
}

/// The allowed origin as a header value, if one is configured and valid.
pub fn allowed_origin(config: &CorsConfig) -> Option<HeaderValue> {
    let raw = config.frontend_url.as_deref()?;
    match normalize_origin(raw) {
        Ok(origin) => HeaderValue::from_str(&origin).ok(),
        Err(reason) => {
            tracing::warn!(%reason, "Ignoring invalid frontend origin");
            None
        }
    }
}

/// Build the CORS pipeline stage.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    match allowed_origin(config) {
        Some(origin) => {
            let credentialed = origin.clone();
            base.allow_origin(AllowOrigin::exact(origin))
                .allow_credentials(AllowCredentials::predicate(move |request_origin, _| {
                    *request_origin == credentialed
                }))
        }
        None => {
            tracing::info!("No frontend origin configured; cross-origin requests are not allowed");
            base.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()))
        }
    }
}
