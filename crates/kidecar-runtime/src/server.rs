//! Liveness endpoint

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Path of the liveness endpoint
pub const HEALTHZ_PATH: &str = "/healthz";

/// Body returned by the liveness endpoint
pub const HEALTHZ_BODY: &str = "OK";

/// Router serving the liveness endpoint
pub fn healthz_router() -> Router {
    Router::new().route(HEALTHZ_PATH, get(|| async { HEALTHZ_BODY }))
}

/// Serve the liveness endpoint on `listener` until `shutdown` is cancelled
pub async fn serve(listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, path = HEALTHZ_PATH, "Liveness endpoint listening");
    }
    axum::serve(listener, healthz_router())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let response = healthz_router()
            .oneshot(Request::builder().uri(HEALTHZ_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = healthz_router()
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, token.clone()));

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
