//! Static file serving module
//!
//! Serves the site's scripts, stylesheets and map layers from the static
//! directory, with `ETag` revalidation.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve `asset` (relative to `static_dir`)
pub async fn serve_static(
    ctx: &RequestContext<'_>,
    static_dir: &str,
    asset: &str,
) -> Response<Full<Bytes>> {
    let Some(file_path) = resolve_asset(static_dir, asset) else {
        return http::build_404_response();
    };

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_path.display()
            ));
            return http::build_404_response();
        }
    };

    let etag = cache::generate_etag(&content);
    if cache::check_etag_match(ctx.if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    http::response::build_cached_response(Bytes::from(content), content_type, &etag, ctx.is_head)
}

/// Map an asset path to a file inside `static_dir`
///
/// Returns `None` for directories, missing files and anything that resolves
/// outside the static directory.
fn resolve_asset(static_dir: &str, asset: &str) -> Option<PathBuf> {
    let root = match Path::new(static_dir).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log
    let candidate = root.join(asset.trim_start_matches('/')).canonicalize().ok()?;
    if !candidate.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {asset} -> {}",
            candidate.display()
        ));
        return None;
    }

    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    fn ctx(if_none_match: Option<&str>) -> RequestContext<'_> {
        RequestContext {
            path: "/static/main/js/map.js",
            query: None,
            is_head: false,
            if_none_match,
        }
    }

    /// Temp tree: `<tmp>/static/main/js/map.js` plus `<tmp>/secret.txt`
    fn site_dir() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("static");
        std::fs::create_dir_all(root.join("main/js")).unwrap();
        std::fs::write(root.join("main/js/map.js"), "console.log(1);").unwrap();
        std::fs::write(dir.path().join("secret.txt"), "x").unwrap();
        let root = root.to_str().unwrap().to_string();
        (dir, root)
    }

    #[tokio::test]
    async fn test_serves_asset_with_mime_type() {
        let (_dir, root) = site_dir();
        let resp = serve_static(&ctx(None), &root, "main/js/map.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["Content-Type"],
            "application/javascript; charset=utf-8"
        );
        assert!(resp.headers().contains_key("ETag"));
    }

    #[tokio::test]
    async fn test_matching_etag_is_304() {
        let (_dir, root) = site_dir();
        let etag = cache::generate_etag(b"console.log(1);");
        let resp = serve_static(&ctx(Some(&etag)), &root, "main/js/map.js").await;
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_traversal_and_directories_are_404() {
        let (_dir, root) = site_dir();

        let resp = serve_static(&ctx(None), &root, "../secret.txt").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = serve_static(&ctx(None), &root, "main/js").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = serve_static(&ctx(None), &root, "missing.css").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
