//! Request logging filter.
//!
//! Records method, path, status and latency of every request that reaches
//! the container, on whichever listener it arrived. The response is passed
//! through untouched.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::observability::metrics;

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();
    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        remote = ?remote,
        "Request handled"
    );
    metrics::record_request(method.as_str(), status.as_u16(), latency);

    response
}

/// Wrap `container` with the logging filter. Call once per container.
pub fn attach_logging(container: Router) -> Router {
    container.layer(middleware::from_fn(request_logging))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::routing::{get, post};
    use tower::ServiceExt;

    fn container() -> Router {
        Router::new()
            .route("/teapot", get(|| async { (StatusCode::IM_A_TEAPOT, [(header::ETAG, "\"v1\"")], "short and stout") }))
            .route("/echo", post(|body: String| async move { body }))
    }

    #[tokio::test]
    async fn passes_response_through_unchanged() {
        let app = attach_logging(container());
        let response = app
            .oneshot(Request::get("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers()[header::ETAG], "\"v1\"");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"short and stout");
    }

    #[tokio::test]
    async fn request_body_reaches_handler() {
        let app = attach_logging(container());
        let response = app
            .oneshot(Request::post("/echo").body(Body::from("ping")).unwrap())
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ping");
    }

    #[tokio::test]
    async fn unmatched_routes_keep_404() {
        let app = attach_logging(container());
        let response = app
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
