use super::{LeaseInner, LockLease, ScheduleLockManager};
use crate::error::{AppError, AppResult};
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Row-based fallback for managed databases that restrict advisory locks.
/// Acquisition is a single atomic insert-or-steal: the conditional update
/// only wins when the existing lease has expired, so an abandoned lock is
/// reclaimed without a separate sweep.
pub struct TableLockManager {
    pool: Arc<DbPool>,
    instance_id: String,
    lease_ttl: Duration,
}

impl TableLockManager {
    pub fn new(pool: Arc<DbPool>, instance_id: String, lease_ttl: Duration) -> Self {
        Self {
            pool,
            instance_id,
            lease_ttl,
        }
    }
}

#[async_trait]
impl ScheduleLockManager for TableLockManager {
    async fn acquire(&self, schedule_id: Uuid) -> AppResult<Option<LockLease>> {
        let now = Utc::now();
        let pool = self.pool.as_ref();

        let result = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO schedule_locks (schedule_id, locked_by, locked_at, locked_until)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (schedule_id) DO UPDATE
            SET locked_by = EXCLUDED.locked_by,
                locked_at = EXCLUDED.locked_at,
                locked_until = EXCLUDED.locked_until
            WHERE schedule_locks.locked_until < $3
            RETURNING locked_by
            "#,
        )
        .bind(schedule_id)
        .bind(&self.instance_id)
        .bind(now)
        .bind(now + self.lease_ttl)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from);

        match result {
            Ok(Some(_)) => Ok(Some(LockLease {
                schedule_id,
                inner: LeaseInner::Table,
            })),
            Ok(None) => Ok(None),
            Err(e) if e.is_undefined_table() => {
                tracing::warn!(
                    schedule_id = %schedule_id,
                    "schedule_locks table not deployed, granting lock unconditionally"
                );
                Ok(Some(LockLease {
                    schedule_id,
                    inner: LeaseInner::FailOpen,
                }))
            }
            Err(e) => Err(e),
        }
    }

    async fn release(&self, lease: LockLease) -> AppResult<()> {
        match lease.inner {
            LeaseInner::Table => {
                let pool = self.pool.as_ref();
                let result = sqlx::query(
                    "DELETE FROM schedule_locks WHERE schedule_id = $1 AND locked_by = $2",
                )
                .bind(lease.schedule_id)
                .bind(&self.instance_id)
                .execute(pool)
                .await
                .map_err(AppError::from);

                match result {
                    Ok(_) => Ok(()),
                    Err(e) if e.is_undefined_table() => Ok(()),
                    Err(e) => Err(e),
                }
            }
            // Nothing to delete for fail-open grants or foreign leases.
            LeaseInner::Advisory { .. } | LeaseInner::FailOpen => Ok(()),
        }
    }
}
