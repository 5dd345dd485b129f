use super::{advisory_key, LeaseInner, LockLease, ScheduleLockManager};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Session advisory locks: the fast path. Each held lock pins one pooled
/// connection for its lifetime, which keeps the lock session-scoped the way
/// Postgres defines it.
pub struct AdvisoryLockManager {
    pool: Arc<DbPool>,
}

impl AdvisoryLockManager {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleLockManager for AdvisoryLockManager {
    async fn acquire(&self, schedule_id: Uuid) -> AppResult<Option<LockLease>> {
        let mut conn = self.pool.acquire().await?;
        let key = advisory_key(schedule_id);

        let granted = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

        if !granted {
            return Ok(None);
        }

        Ok(Some(LockLease {
            schedule_id,
            inner: LeaseInner::Advisory { key, conn },
        }))
    }

    async fn release(&self, lease: LockLease) -> AppResult<()> {
        match lease.inner {
            LeaseInner::Advisory { key, mut conn } => {
                let released = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                    .bind(key)
                    .fetch_one(&mut *conn)
                    .await?;
                if !released {
                    tracing::warn!(
                        schedule_id = %lease.schedule_id,
                        "advisory unlock reported no lock held"
                    );
                }
                Ok(())
            }
            // A lease minted by another manager; dropping it is all that is
            // needed and release stays idempotent.
            LeaseInner::Table | LeaseInner::FailOpen => Ok(()),
        }
    }
}
