use async_trait::async_trait;
use feedrelay_backend::error::AppResult;
use feedrelay_backend::infrastructure::lock::{
    with_lock, LockLease, LockOutcome, ScheduleLockManager,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// In-memory manager with the same non-blocking acquire semantics as the
/// real ones: first caller wins, release frees the slot.
#[derive(Default)]
struct InMemoryLockManager {
    held: AtomicBool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
}

#[async_trait]
impl ScheduleLockManager for InMemoryLockManager {
    async fn acquire(&self, schedule_id: Uuid) -> AppResult<Option<LockLease>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self
            .held
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Ok(Some(LockLease::untracked(schedule_id)))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, _lease: LockLease) -> AppResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn runs_the_closure_exactly_once_when_granted() {
    let manager = InMemoryLockManager::default();
    let calls = AtomicUsize::new(0);

    let outcome = with_lock(&manager, Uuid::new_v4(), false, || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(42)
    })
    .await
    .expect("lock round-trip");

    assert_eq!(outcome, LockOutcome::Completed(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn releases_even_when_the_closure_fails() {
    let manager = InMemoryLockManager::default();

    let outcome: AppResult<LockOutcome<()>> =
        with_lock(&manager, Uuid::new_v4(), false, || async {
            Err(feedrelay_backend::error::AppError::Internal(
                "send blew up".to_string(),
            ))
        })
        .await;

    assert!(outcome.is_err());
    assert_eq!(manager.releases.load(Ordering::SeqCst), 1);
    assert!(!manager.held.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn contended_lock_completes_exactly_one_of_two_runs() {
    let manager = Arc::new(InMemoryLockManager::default());
    let schedule_id = Uuid::new_v4();

    let run = |tag: u32| {
        let manager = manager.clone();
        async move {
            with_lock(manager.as_ref(), schedule_id, false, || async move {
                // Hold the lock across an await point so the second caller
                // observes contention.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(tag)
            })
            .await
            .expect("lock round-trip")
        }
    };

    let (first, second) = tokio::join!(run(1), run(2));

    let completed = [&first, &second]
        .iter()
        .filter(|outcome| matches!(outcome, LockOutcome::Completed(_)))
        .count();
    let skipped = [&first, &second]
        .iter()
        .filter(|outcome| matches!(outcome, LockOutcome::Skipped))
        .count();

    assert_eq!(completed, 1);
    assert_eq!(skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn wait_mode_retries_the_acquire_exactly_once() {
    let manager = Arc::new(InMemoryLockManager::default());
    let schedule_id = Uuid::new_v4();

    // Occupy the lock and free it shortly after, well within the retry
    // pause.
    let occupied = manager
        .acquire(schedule_id)
        .await
        .expect("acquire")
        .expect("lease");
    let release_handle = {
        let manager = manager.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            manager.release(occupied).await.expect("release");
        })
    };

    let outcome = with_lock(manager.as_ref(), schedule_id, true, || async { Ok("ran") })
        .await
        .expect("lock round-trip");

    release_handle.await.expect("release task");
    assert_eq!(outcome, LockOutcome::Completed("ran"));
    // Initial occupy + failed first try + successful retry.
    assert_eq!(manager.acquires.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn still_held_after_the_single_retry_is_a_skip() {
    let manager = Arc::new(InMemoryLockManager::default());
    let schedule_id = Uuid::new_v4();

    let _occupied = manager
        .acquire(schedule_id)
        .await
        .expect("acquire")
        .expect("lease");

    let outcome = with_lock(manager.as_ref(), schedule_id, true, || async { Ok(()) })
        .await
        .expect("lock round-trip");

    assert_eq!(outcome, LockOutcome::Skipped);
    assert_eq!(manager.acquires.load(Ordering::SeqCst), 3);
}
