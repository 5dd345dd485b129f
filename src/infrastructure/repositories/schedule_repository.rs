use crate::infrastructure::db::DbPool;
use crate::{domain::schedule::Schedule, error::AppResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct ScheduleRepository {
    pool: Arc<DbPool>,
}

impl ScheduleRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, schedule_id: Uuid) -> AppResult<Option<Schedule>> {
        let pool = self.pool.as_ref();
        let schedule = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, feed_id, targets, mode, interval_secs, fixed_times, template,
                   active, requires_approval, last_run_at, created_at
            FROM schedules
            WHERE id = $1
            "#,
        )
        .bind(schedule_id)
        .fetch_optional(pool)
        .await?;

        Ok(schedule)
    }

    /// Active schedules bound to a feed; the fan-out input set
    pub async fn find_active_by_feed(&self, feed_id: Uuid) -> AppResult<Vec<Schedule>> {
        let pool = self.pool.as_ref();
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, feed_id, targets, mode, interval_secs, fixed_times, template,
                   active, requires_approval, last_run_at, created_at
            FROM schedules
            WHERE feed_id = $1 AND active
            ORDER BY created_at
            "#,
        )
        .bind(feed_id)
        .fetch_all(pool)
        .await?;

        Ok(schedules)
    }

    /// Active timer-driven schedules (interval and fixed-times modes);
    /// due-ness itself is decided in domain code
    pub async fn find_active_timed(&self) -> AppResult<Vec<Schedule>> {
        let pool = self.pool.as_ref();
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, feed_id, targets, mode, interval_secs, fixed_times, template,
                   active, requires_approval, last_run_at, created_at
            FROM schedules
            WHERE active AND mode <> 'immediate'
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(schedules)
    }

    pub async fn update_last_run(&self, schedule_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let pool = self.pool.as_ref();
        sqlx::query("UPDATE schedules SET last_run_at = $2 WHERE id = $1")
            .bind(schedule_id)
            .bind(now)
            .execute(pool)
            .await?;

        Ok(())
    }
}
