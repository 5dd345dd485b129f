use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// A candidate item as produced by the fetcher collaborator: already
/// HTML-stripped and cleaned of tracking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedItem {
    pub external_id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "empty_object")]
    pub extra: JsonValue,
}

fn empty_object() -> JsonValue {
    serde_json::json!({})
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchMeta {
    #[serde(default)]
    pub not_modified: bool,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub detected_kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub items: Vec<FetchedItem>,
    #[serde(default)]
    pub meta: FetchMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch request failed: {0}")]
    Request(String),

    #[error("fetch timed out")]
    Timeout,

    #[error("fetcher returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Contract with the wire-format collaborator that performs the raw HTTP
/// fetch and parse. Conditional-fetch validators are passed through so the
/// collaborator can answer with `not_modified`.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchRequest {
    pub url: String,
    pub kind: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP adapter to the fetcher sidecar. The sidecar owns wire-format
/// parsing and HTML stripping; this client only speaks the normalized
/// contract shape.
pub struct HttpFeedFetcher {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, FetchError> {
        let endpoint = format!("{}/fetch", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&endpoint)
            .timeout(FETCH_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Upstream { status, body });
        }

        response
            .json::<FetchOutcome>()
            .await
            .map_err(|e| FetchError::Request(format!("invalid fetcher response: {}", e)))
    }
}
