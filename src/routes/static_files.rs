//! Static File Serving
//!
//! Serves the checkout demo pages from the configured static directory.
//! `/` falls back to a built-in page listing the flows when the directory
//! has no `index.html`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::{Path, PathBuf};
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Flow pages linked from the built-in index: (path, title)
const FLOWS: &[(&str, &str)] = &[
    ("/standard/", "Standard checkout"),
    ("/authcap/", "Authorize and capture"),
    ("/shipping/", "Shipping callbacks"),
    ("/subs/", "Subscriptions"),
    ("/tracking/", "Shipment tracking"),
    ("/pui/", "Pay upon invoice"),
    ("/vault/", "Save payment methods"),
    ("/vault-recurring-payments/", "Recurring payments"),
    ("/payout/", "Payouts"),
    ("/invoice/", "Invoicing"),
    ("/multi/", "Multiple sellers"),
    ("/card/", "Card fields"),
    ("/old/", "Hosted fields"),
    ("/googlepay/", "Google Pay"),
    ("/applepay/", "Apple Pay"),
    ("/braintree/", "Braintree Drop-in"),
];

/// Create router for serving static files
pub fn router(static_dir: &Path) -> Router {
    if static_dir.is_dir() {
        info!(path = %static_dir.display(), "Serving static files");
    } else {
        warn!(path = %static_dir.display(), "Static files directory not found");
    }

    let serve_dir = ServeDir::new(static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(serve_index))
        .fallback_service(serve_dir)
        .with_state(static_dir.to_path_buf())
}

async fn serve_index(State(static_dir): State<PathBuf>) -> Response {
    let html = match tokio::fs::read_to_string(static_dir.join("index.html")).await {
        Ok(content) => content,
        Err(_) => flow_index(),
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

fn flow_index() -> String {
    let links: String = FLOWS
        .iter()
        .map(|(path, title)| format!("        <li><a href=\"{}\">{}</a></li>\n", path, title))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Checkout flows</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 720px; margin: 0 auto; padding: 40px 20px; }}
        li {{ margin: 6px 0; }}
        code {{ background: #f2f2f2; padding: 2px 6px; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>Checkout flows</h1>
    <ul>
{}    </ul>
    <p>Server status: <a href="/api/health"><code>GET /api/health</code></a></p>
</body>
</html>"#,
        links
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn fetch(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_builtin_index_lists_flows() {
        let dir = TempDir::new().unwrap();
        let (status, body) = fetch(router(&dir.path().join("missing")), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/standard/">Standard checkout</a>"#));
        assert!(body.contains("/braintree/"));
    }

    #[tokio::test]
    async fn test_serves_files_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("standard")).unwrap();
        std::fs::write(dir.path().join("standard/index.html"), "<h1>standard</h1>").unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();

        let (status, body) = fetch(router(dir.path()), "/standard/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>standard</h1>");

        let (_, body) = fetch(router(dir.path()), "/").await;
        assert_eq!(body, "<h1>home</h1>");

        let (status, _) = fetch(router(dir.path()), "/nope.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
