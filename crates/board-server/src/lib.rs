//! HTTP surface for the metrics cache
//!
//! Handlers only ever read the cache; nothing here triggers a fetch.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use board_metrics::CacheHandle;
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Content type of the text exposition format
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Routes `/metrics` and `/health` over a cache handle
pub fn router(cache: CacheHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(cache)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(cache: CacheHandle, addr: &str, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving metrics on http://{}", listener.local_addr()?);
    axum::serve(listener, router(cache))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Metrics server stopped");
    Ok(())
}

/// GET /metrics - Latest exposition text, empty until the first refresh succeeds
async fn metrics(State(cache): State<CacheHandle>) -> Response {
    let body = match cache.read() {
        Some(entry) => format!("{}\n", entry.text),
        None => {
            warn!("Metrics requested before the first successful refresh");
            String::new()
        }
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// GET /health
async fn health(State(cache): State<CacheHandle>) -> Response {
    if cache.is_populated() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "could not read cache").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use board_core::{BoardError, Result};
    use board_metrics::{Recompute, RefreshingCache};
    use std::time::Duration;
    use tower::ServiceExt;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl Recompute for Fixed {
        async fn recompute(&self) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| BoardError::fetch("projects/1", "unreachable"))
        }
    }

    async fn cache(text: Option<&'static str>) -> RefreshingCache {
        RefreshingCache::start(Duration::from_secs(3600), Fixed(text)).await
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_serves_cached_text() {
        let cache = cache(Some("github_board_issues_count{project=\"7\"} 15")).await;
        let (status, content_type, body) = get(router(cache.handle()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(EXPOSITION_CONTENT_TYPE));
        assert_eq!(body, "github_board_issues_count{project=\"7\"} 15\n");
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_metrics_empty_before_first_refresh() {
        let cache = cache(None).await;
        let (status, _, body) = get(router(cache.handle()), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_health() {
        let ready = cache(Some("x 1")).await;
        let (status, _, body) = get(router(ready.handle()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        ready.shutdown().await;

        let empty = cache(None).await;
        let (status, _, body) = get(router(empty.handle()), "/health").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "could not read cache");
        empty.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let cache = cache(Some("x 1")).await;
        let (status, _, _) = get(router(cache.handle()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        cache.shutdown().await;
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let cache = cache(Some("x 1")).await;
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(cache.handle(), "127.0.0.1:0", async move {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        cache.shutdown().await;
    }
}
