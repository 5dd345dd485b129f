use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// A polled content source. Created by configuration, mutated by the
/// ingestion pipeline after every poll; the core never deletes feeds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub url: String,
    /// Declared or auto-detected format label (e.g. "rss", "atom", "json").
    pub kind: Option<String>,
    pub active: bool,
    pub poll_interval_secs: i64,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: i32,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// A feed is due when it has never been polled or the poll interval has
    /// elapsed since the last attempt.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(self.poll_interval_secs),
        }
    }
}

/// A single stored item of a feed. Within a feed the external identifier is
/// unique; the normalized fingerprint is used for near-duplicate
/// suppression, not hard uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedItem {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub fingerprint: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_hash: Option<String>,
    pub categories: Vec<String>,
    pub extra: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
