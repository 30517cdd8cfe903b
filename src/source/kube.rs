//! HTTP list/watch client for a Kubernetes-style API.
//!
//! Lists are `GET {collection}` returning `{metadata: {resourceVersion}, items}`.
//! Watches are `GET {collection}?watch=true`, answered with one JSON event
//! per line: `{"type": "ADDED" | "MODIFIED" | "DELETED" | "BOOKMARK" | "ERROR", "object": {...}}`.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use url::Url;

use crate::cache::{Resource, ResourceKind, Snapshot, WatchEvent};
use crate::source::{ResourceSource, SourceError, WatchStream};

/// Upper bound on a single watch event line.
const MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(rename = "resourceVersion")]
    resource_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WatchLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    object: Value,
}

/// Client for one API server.
#[derive(Debug, Clone)]
pub struct KubeSource {
    client: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl KubeSource {
    /// Create a client for the API server at `base`.
    ///
    /// Only the connect phase is bounded; watches stay open indefinitely.
    pub fn new(mut base: Url, token: Option<String>, connect_timeout: Duration) -> Result<Self, SourceError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client, base, token })
    }

    fn collection_url(&self, kind: ResourceKind) -> Result<Url, SourceError> {
        let path = kind.collection_path();
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| SourceError::Decode(format!("bad collection url for {}: {}", kind, e)))
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ResourceSource for KubeSource {
    async fn list(&self, kind: ResourceKind) -> Result<Snapshot, SourceError> {
        let url = self.collection_url(kind)?;
        let response = self.get(url).send().await?.error_for_status()?;
        let body: ListResponse = response.json().await?;

        let version = body
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let items = body
            .items
            .into_iter()
            .filter_map(|object| {
                let resource = Resource::from_object(kind, object);
                if resource.is_none() {
                    tracing::debug!(kind = %kind, "Skipping listed object without metadata.name");
                }
                resource
            })
            .collect();

        Ok(Snapshot { version, items })
    }

    async fn watch(&self, kind: ResourceKind) -> Result<WatchStream, SourceError> {
        let url = self.collection_url(kind)?;
        let response = self
            .get(url)
            .query(&[("watch", "true"), ("allowWatchBookmarks", "false")])
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes_stream().map_err(std::io::Error::other);
        let lines = FramedRead::new(
            StreamReader::new(bytes),
            LinesCodec::new_with_max_length(MAX_EVENT_BYTES),
        );

        let events = lines.filter_map(move |line| async move {
            match line {
                Ok(line) => decode_watch_line(kind, &line).transpose(),
                Err(e) => Some(Err(SourceError::Watch(e.to_string()))),
            }
        });
        Ok(events.boxed())
    }
}

/// Decode one line of a watch response.
///
/// Returns `Ok(None)` for lines that carry no change (blank lines, bookmarks).
pub fn decode_watch_line(kind: ResourceKind, line: &str) -> Result<Option<WatchEvent>, SourceError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: WatchLine =
        serde_json::from_str(line).map_err(|e| SourceError::Decode(format!("watch event: {}", e)))?;

    let build = |object: Value| {
        Resource::from_object(kind, object)
            .ok_or_else(|| SourceError::Decode(format!("{} watch event without metadata.name", kind)))
    };

    match parsed.kind.as_str() {
        "ADDED" => Ok(Some(WatchEvent::Added(build(parsed.object)?))),
        "MODIFIED" => Ok(Some(WatchEvent::Modified(build(parsed.object)?))),
        "DELETED" => Ok(Some(WatchEvent::Deleted(build(parsed.object)?))),
        "BOOKMARK" => Ok(None),
        "ERROR" => {
            let message = parsed
                .object
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(SourceError::Watch(message.to_string()))
        }
        other => Err(SourceError::Decode(format!("unknown watch event type {}", other))),
    }
}
