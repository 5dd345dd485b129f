use crate::domain::delivery::DeliveryService;
use crate::domain::ingest::IngestService;
use crate::domain::maintenance::MaintenanceService;
use crate::infrastructure::repositories::{FeedRepository, ScheduleRepository};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Poll loop: every tick, process the feeds whose poll interval elapsed.
/// Ingestion runs unlocked; overlapping instances only repeat dedup work
/// that unique keys absorb.
pub fn spawn_poll_loop(
    ingest: Arc<IngestService>,
    feed_repo: Arc<FeedRepository>,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;

            let due = match feed_repo.find_due(Utc::now()).await {
                Ok(due) => due,
                Err(e) => {
                    tracing::warn!(error = %e, "poll tick could not list due feeds");
                    continue;
                }
            };

            if due.is_empty() {
                continue;
            }
            tracing::debug!(count = due.len(), "poll tick processing due feeds");

            // One task per due feed; runs may overlap with the next tick.
            for feed in due {
                let ingest = ingest.clone();
                tokio::spawn(async move {
                    if let Err(e) = ingest.process(&feed).await {
                        tracing::warn!(feed_id = %feed.id, error = %e, "feed processing failed");
                    }
                });
            }
        }
    })
}

/// Send loop: every tick, run the interval and fixed-times schedules that
/// are due. Each run takes the schedule lock internally, so concurrent
/// instances ticking together cannot double-drain.
pub fn spawn_send_loop(
    delivery: Arc<DeliveryService>,
    schedule_repo: Arc<ScheduleRepository>,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;

            let schedules = match schedule_repo.find_active_timed().await {
                Ok(schedules) => schedules,
                Err(e) => {
                    tracing::warn!(error = %e, "send tick could not list schedules");
                    continue;
                }
            };

            let now = Utc::now();
            // One task per due schedule; the schedule lock keeps overlapping
            // runs of the same schedule out, here and across instances.
            for schedule in schedules.into_iter().filter(|s| s.is_due(now)) {
                let delivery = delivery.clone();
                tokio::spawn(async move {
                    match delivery.run_schedule(schedule.id).await {
                        Ok(outcome) => tracing::info!(
                            schedule_id = %schedule.id,
                            sent = outcome.sent,
                            failed = outcome.failed,
                            skipped = outcome.skipped,
                            reason = ?outcome.reason,
                            "scheduled delivery run"
                        ),
                        Err(e) => tracing::warn!(
                            schedule_id = %schedule.id,
                            error = %e,
                            "scheduled delivery run failed"
                        ),
                    }
                });
            }
        }
    })
}

/// Watchdog loop: reclaim obligations stuck in processing. Deliberately
/// lock-free and short-cadenced.
pub fn spawn_watchdog_loop(maintenance: Arc<MaintenanceService>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;
            if let Err(e) = maintenance.reclaim_stuck().await {
                tracing::warn!(error = %e, "watchdog tick failed");
            }
        }
    })
}

/// Retention loop: daily sweep of expired obligations and orphan-safe feed
/// item deletion.
pub fn spawn_retention_loop(maintenance: Arc<MaintenanceService>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(tick);
        loop {
            ticker.tick().await;
            if let Err(e) = maintenance.prune_expired().await {
                tracing::warn!(error = %e, "retention tick failed");
            }
        }
    })
}
