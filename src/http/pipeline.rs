//! The ordered request pipeline.
//!
//! # Stage Order
//! ```text
//! 1. SecurityHeaders   defensive response headers
//! 2. Cors              single allowed origin
//! 3. Compression       gzip / br / deflate
//! 4. JsonBody          application/json, 50 MB ceiling
//! 5. FormBody          x-www-form-urlencoded, 50 MB ceiling
//! 6. Static            /uploads
//! 7. Api               /api
//! 8. ErrorHandler      uniform error responses
//! ```
//!
//! Tower layers run outermost-first, and the outermost layer is the one added
//! last. The pipeline therefore mounts the routing stages (6, 7) first, wraps
//! stages 5 to 1 around them in reverse, and finally wraps the error handler
//! around everything so it observes every response, including those
//! produced by stages 1 to 5.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, timeout::TimeoutLayer};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::http::middleware::{
    error_stage_middleware, form_body_middleware, json_body_middleware, mount_uploads,
    panic_response, BodyLimits,
};
use crate::security::{cors_layer, security_headers_middleware, SecurityHeaders};

pub const UPLOADS_MOUNT: &str = "/uploads";
pub const API_MOUNT: &str = "/api";

/// One request-processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    SecurityHeaders,
    Cors,
    Compression,
    JsonBody,
    FormBody,
    Static,
    Api,
    ErrorHandler,
}

impl Stage {
    /// The only valid order.
    pub const ORDER: [Stage; 8] = [
        Stage::SecurityHeaders,
        Stage::Cors,
        Stage::Compression,
        Stage::JsonBody,
        Stage::FormBody,
        Stage::Static,
        Stage::Api,
        Stage::ErrorHandler,
    ];

    fn position(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(usize::MAX)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::SecurityHeaders => "security-headers",
            Stage::Cors => "cors",
            Stage::Compression => "compression",
            Stage::JsonBody => "json-body",
            Stage::FormBody => "form-body",
            Stage::Static => "static",
            Stage::Api => "api",
            Stage::ErrorHandler => "error-handler",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("stage {0} appears more than once")]
    Duplicate(Stage),
    #[error("stage {0} is missing")]
    Missing(Stage),
    #[error("stage {stage} must not run after {after}")]
    OutOfOrder { stage: Stage, after: Stage },
}

/// A validated, ordered list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Validate a stage list against the required order.
    pub fn new(stages: Vec<Stage>) -> Result<Self, PipelineError> {
        for (i, stage) in stages.iter().enumerate() {
            if stages[..i].contains(stage) {
                return Err(PipelineError::Duplicate(*stage));
            }
        }
        if let Some(missing) = Stage::ORDER.iter().find(|s| !stages.contains(s)) {
            return Err(PipelineError::Missing(*missing));
        }
        for pair in stages.windows(2) {
            if pair[0].position() > pair[1].position() {
                return Err(PipelineError::OutOfOrder {
                    stage: pair[1],
                    after: pair[0],
                });
            }
        }
        Ok(Self { stages })
    }

    pub fn standard() -> Self {
        Self {
            stages: Stage::ORDER.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Assemble the router: `api` is mounted under [`API_MOUNT`].
    pub fn build(&self, config: &AppConfig, api: Router) -> Router {
        let limits = BodyLimits::from(&config.limits);
        let largest_body = limits.json.max(limits.form);

        // Stages 6 and 7, plus the not-found fallback for everything else.
        let routes = mount_uploads(Router::new(), UPLOADS_MOUNT, &config.uploads.dir)
            .nest(API_MOUNT, api)
            .fallback(|| async { AppError::NotFound })
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(request_timeout(config.timeouts.request_secs))
            .layer(DefaultBodyLimit::max(largest_body));

        let security_headers = Arc::new(SecurityHeaders::from_config(&config.security));

        let mut router = routes;
        for stage in self.stages.iter().rev() {
            router = match stage {
                Stage::SecurityHeaders => router.layer(middleware::from_fn_with_state(
                    security_headers.clone(),
                    security_headers_middleware,
                )),
                Stage::Cors => router.layer(cors_layer(&config.cors)),
                Stage::Compression => router.layer(CompressionLayer::new()),
                Stage::JsonBody => {
                    router.layer(middleware::from_fn_with_state(limits, json_body_middleware))
                }
                Stage::FormBody => {
                    router.layer(middleware::from_fn_with_state(limits, form_body_middleware))
                }
                // Mounted above / wrapped below.
                Stage::Static | Stage::Api | Stage::ErrorHandler => router,
            };
        }

        router.layer(middleware::from_fn(error_stage_middleware))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

#[allow(deprecated)]
fn request_timeout(secs: u64) -> TimeoutLayer {
    TimeoutLayer::new(Duration::from_secs(secs))
}
