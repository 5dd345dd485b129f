use crate::infrastructure::db::DbPool;
use crate::{
    domain::feed::{FeedItem, ItemPatch},
    domain::normalize,
    error::AppResult,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct FeedItemRepository {
    pool: Arc<DbPool>,
}

impl FeedItemRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, item_id: Uuid) -> AppResult<Option<FeedItem>> {
        let pool = self.pool.as_ref();
        let item = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT id, feed_id, external_id, title, url, fingerprint, description,
                   content, author, image_url, published_at, content_hash, categories,
                   extra, created_at, updated_at
            FROM feed_items
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    /// Resolve an item by its stable external identifier within a feed
    pub async fn find_by_external_id(
        &self,
        feed_id: Uuid,
        external_id: &str,
    ) -> AppResult<Option<FeedItem>> {
        let pool = self.pool.as_ref();
        let item = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT id, feed_id, external_id, title, url, fingerprint, description,
                   content, author, image_url, published_at, content_hash, categories,
                   extra, created_at, updated_at
            FROM feed_items
            WHERE feed_id = $1 AND external_id = $2
            "#,
        )
        .bind(feed_id)
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    /// Fallback identity resolution by canonical URL within a feed
    pub async fn find_by_url(&self, feed_id: Uuid, url: &str) -> AppResult<Option<FeedItem>> {
        let pool = self.pool.as_ref();
        let item = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT id, feed_id, external_id, title, url, fingerprint, description,
                   content, author, image_url, published_at, content_hash, categories,
                   extra, created_at, updated_at
            FROM feed_items
            WHERE feed_id = $1 AND url = $2
            LIMIT 1
            "#,
        )
        .bind(feed_id)
        .bind(url)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    /// Items of a feed created at or after `since`; the dedup comparison set
    pub async fn recent_for_feed(
        &self,
        feed_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<FeedItem>> {
        let pool = self.pool.as_ref();
        let items = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT id, feed_id, external_id, title, url, fingerprint, description,
                   content, author, image_url, published_at, content_hash, categories,
                   extra, created_at, updated_at
            FROM feed_items
            WHERE feed_id = $1 AND created_at >= $2
            "#,
        )
        .bind(feed_id)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Items recently put in front of a target, resolved through its
    /// delivery obligations
    pub async fn recent_for_target(
        &self,
        target_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<FeedItem>> {
        let pool = self.pool.as_ref();
        let items = sqlx::query_as::<_, FeedItem>(
            r#"
            SELECT DISTINCT ON (i.id)
                   i.id, i.feed_id, i.external_id, i.title, i.url, i.fingerprint,
                   i.description, i.content, i.author, i.image_url, i.published_at,
                   i.content_hash, i.categories, i.extra, i.created_at, i.updated_at
            FROM feed_items i
            JOIN delivery_obligations o ON o.feed_item_id = i.id
            WHERE o.target_id = $1 AND i.created_at >= $2
            ORDER BY i.id
            "#,
        )
        .bind(target_id)
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Whether the feed has ever stored an item
    pub async fn any_for_feed(&self, feed_id: Uuid) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM feed_items WHERE feed_id = $1)",
        )
        .bind(feed_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Insert a new item. Foreign-key violations (feed deleted mid-run)
    /// surface to the caller; unique-key races on (feed, external id) are
    /// absorbed by the conflict clause.
    pub async fn insert(&self, item: &FeedItem) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            INSERT INTO feed_items (
                id, feed_id, external_id, title, url, fingerprint, description,
                content, author, image_url, published_at, content_hash, categories,
                extra, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (feed_id, external_id) DO NOTHING
            "#,
        )
        .bind(item.id)
        .bind(item.feed_id)
        .bind(&item.external_id)
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.fingerprint)
        .bind(&item.description)
        .bind(&item.content)
        .bind(&item.author)
        .bind(&item.image_url)
        .bind(item.published_at)
        .bind(&item.content_hash)
        .bind(&item.categories)
        .bind(&item.extra)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Apply a field patch in place, refreshing the stored fingerprint
    pub async fn update(
        &self,
        item_id: Uuid,
        patch: &ItemPatch,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE feed_items
            SET title = $2,
                url = $3,
                fingerprint = $4,
                description = $5,
                content = $6,
                author = $7,
                image_url = $8,
                published_at = $9,
                content_hash = $10,
                categories = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .bind(&patch.title)
        .bind(&patch.url)
        .bind(normalize::fingerprint(&patch.title, &patch.url))
        .bind(&patch.description)
        .bind(&patch.content)
        .bind(&patch.author)
        .bind(&patch.image_url)
        .bind(patch.published_at)
        .bind(&patch.content_hash)
        .bind(&patch.categories)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Delete items past the retention window that no obligation still
    /// references. Returns the number of rows removed.
    pub async fn delete_expired_unreferenced(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            DELETE FROM feed_items i
            WHERE i.created_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM delivery_obligations o WHERE o.feed_item_id = i.id
              )
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
