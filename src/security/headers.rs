//! Defensive response headers.
//!
//! Headers are only added when the handler did not set them itself, so a
//! route can still opt into a looser policy for a single response.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityConfig;

/// The resolved header set, built once from configuration.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig) -> Self {
        if !config.enable_headers {
            return Self { headers: Vec::new() };
        }

        let deny = config.frame_options.eq_ignore_ascii_case("DENY");
        let frame_options = if deny { "DENY" } else { "SAMEORIGIN" };
        let frame_ancestors = if deny { "'none'" } else { "'self'" };
        let csp = format!(
            "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
             form-action 'self';frame-ancestors {frame_ancestors};img-src 'self' data:;\
             object-src 'none';script-src 'self';script-src-attr 'none';\
             style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests"
        );
        let hsts = format!("max-age={}; includeSubDomains", config.hsts_max_age_secs);

        let mut headers = vec![
            (
                HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            ),
            (
                HeaderName::from_static("x-frame-options"),
                HeaderValue::from_static(frame_options),
            ),
            (
                HeaderName::from_static("x-dns-prefetch-control"),
                HeaderValue::from_static("off"),
            ),
            (
                HeaderName::from_static("referrer-policy"),
                HeaderValue::from_static("no-referrer"),
            ),
            (
                HeaderName::from_static("x-download-options"),
                HeaderValue::from_static("noopen"),
            ),
            (
                HeaderName::from_static("x-permitted-cross-domain-policies"),
                HeaderValue::from_static("none"),
            ),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("origin-agent-cluster"),
                HeaderValue::from_static("?1"),
            ),
            (
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("0"),
            ),
        ];

        // Both values are built from ASCII literals and integers.
        if let Ok(value) = HeaderValue::from_str(&hsts) {
            headers.push((HeaderName::from_static("strict-transport-security"), value));
        }
        if let Ok(value) = HeaderValue::from_str(&csp) {
            headers.push((HeaderName::from_static("content-security-policy"), value));
        }

        Self { headers }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    fn apply(&self, response: &mut Response) {
        let target = response.headers_mut();
        for (name, value) in &self.headers {
            if !target.contains_key(name) {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Security-headers pipeline stage.
pub async fn security_headers_middleware(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(headers: &'a SecurityHeaders, name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .and_then(|(_, v)| v.to_str().ok())
    }

    #[test]
    fn defaults_forbid_sniffing_and_foreign_framing() {
        let headers = SecurityHeaders::from_config(&SecurityConfig::default());
        assert_eq!(value(&headers, "x-content-type-options"), Some("nosniff"));
        assert_eq!(value(&headers, "x-frame-options"), Some("SAMEORIGIN"));
        assert_eq!(
            value(&headers, "strict-transport-security"),
            Some("max-age=15552000; includeSubDomains")
        );
        assert!(value(&headers, "content-security-policy")
            .unwrap()
            .contains("frame-ancestors 'self'"));
    }

    #[test]
    fn deny_tightens_frame_ancestors() {
        let config = SecurityConfig {
            frame_options: "deny".into(),
            ..Default::default()
        };
        let headers = SecurityHeaders::from_config(&config);
        assert_eq!(value(&headers, "x-frame-options"), Some("DENY"));
        assert!(value(&headers, "content-security-policy")
            .unwrap()
            .contains("frame-ancestors 'none'"));
    }

    #[test]
    fn disabled_headers_yield_empty_set() {
        let config = SecurityConfig {
            enable_headers: false,
            ..Default::default()
        };
        assert!(SecurityHeaders::from_config(&config).is_empty());
    }

    #[test]
    fn handler_values_are_kept() {
        let headers = SecurityHeaders::from_config(&SecurityConfig::default());
        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.apply(&mut response);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }
}
