//! Static serving of the upload directory.
//!
//! Mounted under `/uploads`, ahead of the API. Only `GET`/`HEAD` on regular
//! files are served; anything else, missing files, directories and hidden
//! (dot-prefixed) paths all answer with the uniform 404.

use std::path::Path;

use axum::{
    body::Body,
    handler::HandlerWithoutStateExt,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

use crate::error::AppError;

async fn upload_not_found() -> AppError {
    AppError::NotFound
}

/// True when any path segment names a dotfile (`.env`, `.git/config`, ...).
pub fn is_hidden_path(path: &str) -> bool {
    path.split('/').any(|segment| {
        let lowered = segment.to_ascii_lowercase();
        lowered.starts_with('.') || lowered.starts_with("%2e")
    })
}

async fn hide_dotfiles(request: Request<Body>, next: Next) -> Response {
    if is_hidden_path(request.uri().path()) {
        return AppError::NotFound.into_response();
    }
    next.run(request).await
}

/// Mount `dir` at `mount` on `router`.
pub fn mount_uploads(router: Router, mount: &str, dir: &Path) -> Router {
    let serve_dir = ServeDir::new(dir)
        .append_index_html_on_directories(false)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(upload_not_found.into_service());

    let service = ServiceBuilder::new()
        .layer(middleware::from_fn(hide_dotfiles))
        .service(serve_dir);

    router.nest_service(mount, service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_segments_are_hidden() {
        assert!(is_hidden_path("/.env"));
        assert!(is_hidden_path("/nested/.git/config"));
        assert!(is_hidden_path("/%2Ehtaccess"));
        assert!(!is_hidden_path("/picture.png"));
        assert!(!is_hidden_path("/avatars/user.1.png"));
    }
}
