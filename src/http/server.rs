//! Container assembly.
//!
//! # Responsibilities
//! - Mount the default routes over the synchronized caches
//! - Bound request time
//! - Attach the logging filter exactly once
//!
//! The resulting `Router` is cloned into every listener, so plaintext and
//! TLS traffic see the same routes and the same filter.

use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::cache::Caches;
use crate::config::ServerConfig;
use crate::http::middleware::attach_logging;
use crate::http::routes;

/// Build the request container served by every listener.
pub fn build_container(caches: Caches, config: &ServerConfig) -> Router {
    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs.max(1)));
    attach_logging(routes::container(caches).layer(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn container_answers_probes() {
        let app = build_container(Caches::default(), &ServerConfig::default());
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
