use crate::infrastructure::db::DbPool;
use crate::{
    domain::delivery::{DeliveryObligation, ObligationStatus},
    error::AppResult,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// A fan-out candidate row, before it exists in the store.
#[derive(Debug, Clone)]
pub struct NewObligation {
    pub schedule_id: Uuid,
    pub feed_item_id: Uuid,
    pub target_id: String,
    pub status: ObligationStatus,
}

/// Per-status row counts for one schedule, used by diagnostics.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ObligationCounts {
    pub awaiting_approval: i64,
    pub pending: i64,
    pub processing: i64,
    pub sent: i64,
    pub failed: i64,
}

pub struct ObligationRepository {
    pool: Arc<DbPool>,
}

impl ObligationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Insert fan-out candidates idempotently. The unique key on
    /// (schedule, item, target) plus the conflict clause makes concurrent
    /// fan-out runs race-safe: losers insert zero rows and see no error.
    /// Returns how many rows were actually created.
    pub async fn insert_ignore(&self, obligations: &[NewObligation]) -> AppResult<u64> {
        let pool = self.pool.as_ref();
        let mut inserted = 0u64;

        for obligation in obligations {
            let result = sqlx::query(
                r#"
                INSERT INTO delivery_obligations (
                    id, schedule_id, feed_item_id, target_id, status, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (schedule_id, feed_item_id, target_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(obligation.schedule_id)
            .bind(obligation.feed_item_id)
            .bind(&obligation.target_id)
            .bind(obligation.status)
            .bind(Utc::now())
            .execute(pool)
            .await?;

            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    /// The (item, target) pairs of a schedule that already have an
    /// obligation, restricted to the candidate item and target sets
    pub async fn existing_pairs(
        &self,
        schedule_id: Uuid,
        item_ids: &[Uuid],
        target_ids: &[String],
    ) -> AppResult<Vec<(Uuid, String)>> {
        let pool = self.pool.as_ref();
        let pairs = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT feed_item_id, target_id
            FROM delivery_obligations
            WHERE schedule_id = $1
              AND feed_item_id = ANY($2)
              AND target_id = ANY($3)
            "#,
        )
        .bind(schedule_id)
        .bind(item_ids)
        .bind(target_ids)
        .fetch_all(pool)
        .await?;

        Ok(pairs)
    }

    /// Pending obligations of one target under one schedule, oldest first
    pub async fn pending_for_target(
        &self,
        schedule_id: Uuid,
        target_id: &str,
    ) -> AppResult<Vec<DeliveryObligation>> {
        let pool = self.pool.as_ref();
        let obligations = sqlx::query_as::<_, DeliveryObligation>(
            r#"
            SELECT id, schedule_id, feed_item_id, target_id, status, rendered_content,
                   error, transport_message_id, created_at, processing_started_at,
                   sent_at, delivered_at, read_at
            FROM delivery_obligations
            WHERE schedule_id = $1 AND target_id = $2 AND status = 'pending'
            ORDER BY created_at
            "#,
        )
        .bind(schedule_id)
        .bind(target_id)
        .fetch_all(pool)
        .await?;

        Ok(obligations)
    }

    /// Whether this (item, target) pair was already sent under any other
    /// schedule. Cross-schedule suppression is keyed by (item, target)
    /// alone: two schedules aimed at the same recipient deliver once total.
    pub async fn sent_under_other_schedule(
        &self,
        feed_item_id: Uuid,
        target_id: &str,
        current_schedule_id: Uuid,
    ) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM delivery_obligations
                WHERE feed_item_id = $1
                  AND target_id = $2
                  AND schedule_id <> $3
                  AND status = 'sent'
            )
            "#,
        )
        .bind(feed_item_id)
        .bind(target_id)
        .bind(current_schedule_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Move an obligation into `processing`, stamping the watchdog cursor
    pub async fn mark_processing(&self, obligation_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE delivery_obligations
            SET status = 'processing', processing_started_at = $2
            WHERE id = $1
            "#,
        )
        .bind(obligation_id)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_sent(
        &self,
        obligation_id: Uuid,
        transport_message_id: &str,
        rendered_content: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE delivery_obligations
            SET status = 'sent',
                transport_message_id = $2,
                rendered_content = $3,
                sent_at = $4,
                error = NULL
            WHERE id = $1
            "#,
        )
        .bind(obligation_id)
        .bind(transport_message_id)
        .bind(rendered_content)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(&self, obligation_id: Uuid, error: &str) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query(
            r#"
            UPDATE delivery_obligations
            SET status = 'failed', error = $2
            WHERE id = $1
            "#,
        )
        .bind(obligation_id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Release a manually held obligation into the pending queue. Returns
    /// false when the obligation was not awaiting approval.
    pub async fn approve(&self, obligation_id: Uuid) -> AppResult<bool> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE delivery_obligations
            SET status = 'pending'
            WHERE id = $1 AND status = 'awaiting_approval'
            "#,
        )
        .bind(obligation_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Reset obligations stuck in `processing` since before `cutoff` back to
    /// `pending`, clearing the processing cursor. Terminal rows are never
    /// touched. Returns the number of reclaimed rows.
    pub async fn reclaim_stuck(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE delivery_obligations
            SET status = 'pending', processing_started_at = NULL
            WHERE status = 'processing'
              AND processing_started_at IS NOT NULL
              AND processing_started_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Remove terminal obligations past the retention window
    pub async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let pool = self.pool.as_ref();
        let result = sqlx::query(
            r#"
            DELETE FROM delivery_obligations
            WHERE status IN ('sent', 'failed')
              AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Per-status counts for one schedule
    pub async fn counts_for_schedule(&self, schedule_id: Uuid) -> AppResult<ObligationCounts> {
        let pool = self.pool.as_ref();
        let rows = sqlx::query_as::<_, (ObligationStatus, i64)>(
            r#"
            SELECT status, COUNT(*)
            FROM delivery_obligations
            WHERE schedule_id = $1
            GROUP BY status
            "#,
        )
        .bind(schedule_id)
        .fetch_all(pool)
        .await?;

        let mut counts = ObligationCounts::default();
        for (status, count) in rows {
            match status {
                ObligationStatus::AwaitingApproval => counts.awaiting_approval = count,
                ObligationStatus::Pending => counts.pending = count,
                ObligationStatus::Processing => counts.processing = count,
                ObligationStatus::Sent => counts.sent = count,
                ObligationStatus::Failed => counts.failed = count,
            }
        }

        Ok(counts)
    }
}
