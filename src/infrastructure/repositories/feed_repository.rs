use crate::infrastructure::db::DbPool;
use crate::{domain::feed::Feed, error::AppResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct FeedRepository {
    pool: Arc<DbPool>,
}

impl FeedRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Get a feed by ID
    pub async fn find_by_id(&self, feed_id: Uuid) -> AppResult<Option<Feed>> {
        let pool = self.pool.as_ref();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, kind, active, poll_interval_secs, etag, last_modified,
                   last_fetched_at, last_success_at, last_error, consecutive_failures, created_at
            FROM feeds
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .fetch_optional(pool)
        .await?;

        Ok(feed)
    }

    /// All active feeds, oldest-created first
    pub async fn find_active(&self) -> AppResult<Vec<Feed>> {
        let pool = self.pool.as_ref();
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, kind, active, poll_interval_secs, etag, last_modified,
                   last_fetched_at, last_success_at, last_error, consecutive_failures, created_at
            FROM feeds
            WHERE active
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(feeds)
    }

    /// Active feeds whose poll interval has elapsed (or that were never polled)
    pub async fn find_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Feed>> {
        let pool = self.pool.as_ref();
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, kind, active, poll_interval_secs, etag, last_modified,
                   last_fetched_at, last_success_at, last_error, consecutive_failures, created_at
            FROM feeds
            WHERE active
              AND (last_fetched_at IS NULL
                   OR last_fetched_at + poll_interval_secs * interval '1 second' <= $1)
            ORDER BY last_fetched_at NULLS FIRST
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await?;

        Ok(feeds)
    }

    /// Record a successful poll: advance both cursors, clear the error
    /// state, persist fresh conditional-fetch validators and the detected
    /// format (keeping the previous values when the fetcher sent none).
    pub async fn record_success(
        &self,
        feed_id: Uuid,
        etag: Option<&str>,
        last_modified: Option<&str>,
        detected_kind: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = $2,
                last_success_at = $2,
                last_error = NULL,
                consecutive_failures = 0,
                etag = COALESCE($3, etag),
                last_modified = COALESCE($4, last_modified),
                kind = COALESCE($5, kind)
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .bind(now)
        .bind(etag)
        .bind(last_modified)
        .bind(detected_kind)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record a failed poll: bump the attempt cursor, keep the success
    /// cursor, store the error and grow the failure streak.
    pub async fn record_failure(
        &self,
        feed_id: Uuid,
        error: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = $2,
                last_error = $3,
                consecutive_failures = consecutive_failures + 1
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .bind(now)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }
}
