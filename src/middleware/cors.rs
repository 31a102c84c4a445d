// CORS configuration

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Allow any origin when none are configured, otherwise only the listed ones.
/// Unparseable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn allow_origin_header(origins: &[String], origin: &str) -> Option<String> {
        let app = Router::new()
            .route("/api/health", get(|| async { "ok" }))
            .layer(cors_layer(origins));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("origin", origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_any_origin_when_unconfigured() {
        assert_eq!(
            allow_origin_header(&[], "https://shop.example").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn test_listed_origins_only() {
        let origins = vec!["https://shop.example".to_string()];
        assert_eq!(
            allow_origin_header(&origins, "https://shop.example").await.as_deref(),
            Some("https://shop.example")
        );
        assert_eq!(allow_origin_header(&origins, "https://evil.example").await, None);
    }
}
