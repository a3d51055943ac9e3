//! Static file routing for the exported build.
//!
//! `ServeDir` handles path mapping, `index.html` for directories, traversal
//! rejection and 404s. The header policy is layered on top so it reaches every
//! response, including 404s and directory redirects.

use std::path::Path;

use axum::{middleware, Router};
use axum::http::header::{HeaderName, HeaderValue};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::HEADER_POLICY;
use crate::middleware::request_id_layer;

/// Creates the router serving `root` with the response header policy applied.
pub fn create_router(root: &Path) -> Router {
    let mut router = Router::new().fallback_service(ServeDir::new(root));

    for (name, value) in HEADER_POLICY {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    // Request ID middleware - creates root span with request_id for correlation
    router.layer(middleware::from_fn(request_id_layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn export_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>game</h1>").unwrap();
        std::fs::create_dir(dir.path().join("levels")).unwrap();
        std::fs::write(dir.path().join("levels").join("index.html"), "levels").unwrap();
        std::fs::write(dir.path().join("game.wasm"), [0u8, 97, 115, 109]).unwrap();
        dir
    }

    async fn get(router: Router, uri: &str) -> axum::response::Response {
        router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn assert_policy_headers(response: &axum::response::Response) {
        let headers = response.headers();
        assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
        assert_eq!(headers["cross-origin-embedder-policy"], "require-corp");
        assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate");
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let dir = export_dir();
        let response = get(create_router(dir.path()), "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_policy_headers(&response);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>game</h1>");
    }

    #[tokio::test]
    async fn test_file_is_served_with_headers() {
        let dir = export_dir();
        let response = get(create_router(dir.path()), "/game.wasm").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_policy_headers(&response);
        assert_eq!(response.headers()["content-type"], "application/wasm");
    }

    #[tokio::test]
    async fn test_missing_file_is_404_with_headers() {
        let dir = export_dir();
        let response = get(create_router(dir.path()), "/nope.js").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_policy_headers(&response);
    }

    #[tokio::test]
    async fn test_directory_without_slash_redirects_with_headers() {
        let dir = export_dir();
        let response = get(create_router(dir.path()), "/levels").await;

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/levels/");
        assert_policy_headers(&response);
    }

    #[tokio::test]
    async fn test_subdirectory_index() {
        let dir = export_dir();
        let response = get(create_router(dir.path()), "/levels/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"levels");
    }

    #[tokio::test]
    async fn test_parent_segments_are_rejected() {
        let parent = tempfile::tempdir().unwrap();
        std::fs::write(parent.path().join("secret.txt"), "secret").unwrap();
        let root = parent.path().join("web");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("index.html"), "ok").unwrap();

        for uri in ["/../secret.txt", "/%2e%2e/secret.txt", "/levels/../../secret.txt"] {
            let response = get(create_router(&root), uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {uri}");
            assert_policy_headers(&response);
        }
    }
}
