use super::model::DeliveryObligation;
use super::render::render_message;
use crate::domain::blackout::BlackoutGate;
use crate::domain::schedule::Schedule;
use crate::domain::settings::SettingsService;
use crate::error::{AppError, AppResult};
use crate::infrastructure::lock::{with_lock, LockOutcome, ScheduleLockManager};
use crate::infrastructure::repositories::{
    FeedItemRepository, ObligationRepository, ScheduleRepository,
};
use crate::infrastructure::transport::Transport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const REASON_ITEM_MISSING: &str = "feed item no longer exists";
const REASON_ALREADY_SENT: &str = "already sent to this target";

/// Result of one schedule run.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub sent: u32,
    pub failed: u32,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When a blackout caused the skip: the instant delivery is expected to
    /// resume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumes_at: Option<DateTime<Utc>>,
}

impl DeliveryOutcome {
    fn skipped(reason: &str, resumes_at: Option<DateTime<Utc>>) -> Self {
        Self {
            sent: 0,
            failed: 0,
            skipped: true,
            reason: Some(reason.to_string()),
            resumes_at,
        }
    }
}

/// Drains pending obligations for a schedule: renders content, sends
/// through the transport and advances obligation status with failure
/// bookkeeping. Runs are serialized per schedule across instances by the
/// lock manager; the blackout gate is consulted once at the top of each
/// run.
pub struct DeliveryService {
    schedule_repo: Arc<ScheduleRepository>,
    obligation_repo: Arc<ObligationRepository>,
    item_repo: Arc<FeedItemRepository>,
    transport: Arc<dyn Transport>,
    gate: Arc<BlackoutGate>,
    lock_manager: Arc<dyn ScheduleLockManager>,
    settings: Arc<SettingsService>,
}

impl DeliveryService {
    pub fn new(
        schedule_repo: Arc<ScheduleRepository>,
        obligation_repo: Arc<ObligationRepository>,
        item_repo: Arc<FeedItemRepository>,
        transport: Arc<dyn Transport>,
        gate: Arc<BlackoutGate>,
        lock_manager: Arc<dyn ScheduleLockManager>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            schedule_repo,
            obligation_repo,
            item_repo,
            transport,
            gate,
            lock_manager,
            settings,
        }
    }

    /// Run one schedule under its lock. Two instances never drain the same
    /// schedule concurrently; the loser skips rather than waits.
    pub async fn run_schedule(&self, schedule_id: Uuid) -> AppResult<DeliveryOutcome> {
        let schedule = self
            .schedule_repo
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", schedule_id)))?;

        let outcome = with_lock(self.lock_manager.as_ref(), schedule_id, false, || async {
            self.drain(&schedule).await
        })
        .await?;

        match outcome {
            LockOutcome::Completed(outcome) => Ok(outcome),
            LockOutcome::Skipped => {
                tracing::debug!(schedule_id = %schedule_id, "schedule locked elsewhere, skipping run");
                Ok(DeliveryOutcome::skipped("schedule is locked by another instance", None))
            }
        }
    }

    async fn drain(&self, schedule: &Schedule) -> AppResult<DeliveryOutcome> {
        if !schedule.active {
            return Ok(DeliveryOutcome::skipped("schedule is not active", None));
        }

        let blackout = self.gate.current().await;
        if blackout.active {
            tracing::info!(
                schedule_id = %schedule.id,
                ends_at = ?blackout.ends_at,
                reason = ?blackout.reason,
                "delivery suspended by blackout window"
            );
            return Ok(DeliveryOutcome::skipped(
                "delivery suspended by blackout window",
                blackout.ends_at,
            ));
        }

        let send_delay = self.settings.send_delay().await?;

        let mut sent = 0u32;
        let mut failed = 0u32;
        let mut first_send = true;

        for target_id in &schedule.targets {
            let pending = self
                .obligation_repo
                .pending_for_target(schedule.id, target_id)
                .await?;

            for obligation in pending {
                if !first_send {
                    tokio::time::sleep(send_delay).await;
                }
                first_send = false;

                if self.deliver_one(schedule, &obligation).await? {
                    sent += 1;
                } else {
                    failed += 1;
                }
            }
        }

        // The run happened; the cursor moves even when every send failed.
        self.schedule_repo
            .update_last_run(schedule.id, Utc::now())
            .await?;

        tracing::info!(
            schedule_id = %schedule.id,
            sent,
            failed,
            "delivery run finished"
        );

        Ok(DeliveryOutcome {
            sent,
            failed,
            skipped: false,
            reason: None,
            resumes_at: None,
        })
    }

    /// Returns true when the obligation went out, false when it was marked
    /// failed instead.
    async fn deliver_one(
        &self,
        schedule: &Schedule,
        obligation: &DeliveryObligation,
    ) -> AppResult<bool> {
        let item = match self.item_repo.find_by_id(obligation.feed_item_id).await? {
            Some(item) => item,
            None => {
                self.obligation_repo
                    .mark_failed(obligation.id, REASON_ITEM_MISSING)
                    .await?;
                return Ok(false);
            }
        };

        // A pair already sent under any other schedule is delivered once
        // total; this run only records why it went nowhere.
        if self
            .obligation_repo
            .sent_under_other_schedule(item.id, &obligation.target_id, schedule.id)
            .await?
        {
            self.obligation_repo
                .mark_failed(obligation.id, REASON_ALREADY_SENT)
                .await?;
            return Ok(false);
        }

        let content = render_message(schedule.template.as_deref(), &item);

        self.obligation_repo
            .mark_processing(obligation.id, Utc::now())
            .await?;

        match self.transport.send(&obligation.target_id, &content).await {
            Ok(receipt) => {
                self.obligation_repo
                    .mark_sent(obligation.id, &receipt.message_id, &content, Utc::now())
                    .await?;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    obligation_id = %obligation.id,
                    target_id = %obligation.target_id,
                    error = %e,
                    "transport send failed"
                );
                self.obligation_repo
                    .mark_failed(obligation.id, &e.to_string())
                    .await?;
                Ok(false)
            }
        }
    }

    /// Release a held obligation into the pending queue.
    pub async fn approve_obligation(&self, obligation_id: Uuid) -> AppResult<()> {
        let approved = self.obligation_repo.approve(obligation_id).await?;
        if !approved {
            return Err(AppError::Conflict(
                "Obligation is not awaiting approval".to_string(),
            ));
        }
        Ok(())
    }
}
