pub mod advisory;
pub mod table;

pub use advisory::AdvisoryLockManager;
pub use table::TableLockManager;

use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Proof of a granted schedule lock; handed back on release. Advisory
/// leases pin the session connection the lock lives on.
pub struct LockLease {
    pub schedule_id: Uuid,
    pub(crate) inner: LeaseInner,
}

pub(crate) enum LeaseInner {
    Advisory {
        key: i64,
        conn: PoolConnection<Postgres>,
    },
    Table,
    /// Granted unconditionally because the lock table is not deployed.
    FailOpen,
}

impl LockLease {
    /// A lease backed by no store row or session, for managers that grant
    /// without tracking state.
    pub fn untracked(schedule_id: Uuid) -> Self {
        Self {
            schedule_id,
            inner: LeaseInner::FailOpen,
        }
    }
}

/// Mutual exclusion per schedule across process instances. `acquire` is
/// non-blocking; `release` is idempotent and safe even when the lock was
/// never held.
#[async_trait]
pub trait ScheduleLockManager: Send + Sync {
    async fn acquire(&self, schedule_id: Uuid) -> AppResult<Option<LockLease>>;

    async fn release(&self, lease: LockLease) -> AppResult<()>;
}

/// Outcome of a lock-wrapped run.
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome<T> {
    Completed(T),
    /// The lock was held elsewhere and the run was not attempted.
    Skipped,
}

const ACQUIRE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Run `f` under the schedule lock. `f` runs exactly once if the lock is
/// granted and the lease is always returned, whether `f` succeeds or
/// fails. On contention the run is skipped; with `wait_for_lock` set the
/// acquire is retried exactly once after a short pause.
pub async fn with_lock<T, F, Fut>(
    manager: &dyn ScheduleLockManager,
    schedule_id: Uuid,
    wait_for_lock: bool,
    f: F,
) -> AppResult<LockOutcome<T>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let lease = match manager.acquire(schedule_id).await? {
        Some(lease) => lease,
        None if wait_for_lock => {
            tokio::time::sleep(ACQUIRE_RETRY_DELAY).await;
            match manager.acquire(schedule_id).await? {
                Some(lease) => lease,
                None => return Ok(LockOutcome::Skipped),
            }
        }
        None => return Ok(LockOutcome::Skipped),
    };

    let result = f().await;

    if let Err(e) = manager.release(lease).await {
        tracing::warn!(schedule_id = %schedule_id, error = %e, "schedule lock release failed");
    }

    result.map(LockOutcome::Completed)
}

/// Map a schedule id into the advisory-lock key space. Collisions cost
/// liveness, not correctness.
pub fn advisory_key(schedule_id: Uuid) -> i64 {
    let digest = Sha256::digest(schedule_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Startup capability probe: when session advisory locks are usable, the
/// advisory manager is selected; otherwise the table fallback.
pub async fn select_lock_manager(
    pool: Arc<DbPool>,
    instance_id: String,
    table_lease_ttl: chrono::Duration,
) -> Arc<dyn ScheduleLockManager> {
    if advisory_locks_available(&pool).await {
        tracing::info!("using session advisory locks for schedule coordination");
        Arc::new(AdvisoryLockManager::new(pool))
    } else {
        tracing::warn!("advisory locks unavailable, falling back to table locks");
        Arc::new(TableLockManager::new(pool, instance_id, table_lease_ttl))
    }
}

async fn advisory_locks_available(pool: &DbPool) -> bool {
    let probe_key = advisory_key(Uuid::nil());

    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(_) => return false,
    };

    let locked = sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
        .bind(probe_key)
        .fetch_one(&mut *conn)
        .await;

    match locked {
        Ok(true) => {
            let _ = sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                .bind(probe_key)
                .fetch_one(&mut *conn)
                .await;
            true
        }
        // Held elsewhere still proves the primitive works.
        Ok(false) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_key_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(advisory_key(id), advisory_key(id));
    }

    #[test]
    fn advisory_key_separates_distinct_schedules() {
        assert_ne!(advisory_key(Uuid::new_v4()), advisory_key(Uuid::new_v4()));
    }
}
