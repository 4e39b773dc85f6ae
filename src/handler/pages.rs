//! Page rendering
//!
//! Each page is a template file looked up by name in the template directory
//! and returned as HTML.

use crate::handler::router::{Page, RequestContext};
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::Path;
use tokio::fs;

/// Render `page` from `template_dir`; 404 if the template is missing
pub async fn render(
    ctx: &RequestContext<'_>,
    page: Page,
    template_dir: &str,
) -> Response<Full<Bytes>> {
    let path = Path::new(template_dir).join(page.template());
    match fs::read(&path).await {
        Ok(html) => http::response::build_html_response(html, ctx.is_head),
        Err(e) => {
            logger::log_error(&format!(
                "Failed to load template '{}': {e}",
                path.display()
            ));
            http::build_404_response()
        }
    }
}
