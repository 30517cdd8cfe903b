//! Default request container.
//!
//! Probes plus read-only lookups into the synchronized caches. Every lookup
//! goes through the synchronizer's accessors, never the backing store.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::{object_key, Caches, ResourceCacheSynchronizer, ResourceKind};

/// Error answered by the lookup routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown resource kind {0:?}")]
    UnknownKind(String),
    #[error("{0} is not cached by this server")]
    NotCached(ResourceKind),
    #[error("{kind} {key:?} not found")]
    NotFound { kind: ResourceKind, key: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    namespace: Option<String>,
}

/// Build the container serving from `caches`.
pub fn container(caches: Caches) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/cache/{kind}", get(list_objects))
        .route("/cache/{kind}/{name}", get(get_cluster_object))
        .route("/cache/{kind}/{namespace}/{name}", get(get_namespaced_object))
        .fallback(not_found)
        .with_state(caches)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(caches): State<Caches>) -> Response {
    let pending: Vec<&'static str> = caches
        .iter()
        .filter(|s| !s.is_synchronized())
        .map(|s| s.kind().as_str())
        .collect();

    if pending.is_empty() {
        (StatusCode::OK, Json(json!({ "status": "ready", "kinds": caches.len() }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "syncing", "pending": pending })),
        )
            .into_response()
    }
}

async fn list_objects(
    State(caches): State<Caches>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let cache = lookup(&caches, &kind)?;
    let items = match params.namespace {
        Some(namespace) => cache.list_namespace(&namespace),
        None => cache.list(),
    };
    Ok(Json(items.into_iter().map(|r| r.object).collect()))
}

async fn get_cluster_object(
    State(caches): State<Caches>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    get_object(&caches, &kind, None, &name)
}

async fn get_namespaced_object(
    State(caches): State<Caches>,
    Path((kind, namespace, name)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    get_object(&caches, &kind, Some(&namespace), &name)
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "no such route" })))
}

fn lookup<'a>(caches: &'a Caches, kind: &str) -> Result<&'a Arc<ResourceCacheSynchronizer>, ApiError> {
    let kind: ResourceKind = kind.parse().map_err(|_| ApiError::UnknownKind(kind.to_string()))?;
    caches.get(kind).ok_or(ApiError::NotCached(kind))
}

fn get_object(caches: &Caches, kind: &str, namespace: Option<&str>, name: &str) -> Result<Json<Value>, ApiError> {
    let cache = lookup(caches, kind)?;
    let key = object_key(namespace, name);
    cache
        .get(&key)
        .map(|r| Json(r.object))
        .ok_or(ApiError::NotFound { kind: cache.kind(), key })
}
