use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::blackout::{BlackoutGate, BlackoutStatus};
use crate::domain::delivery::{DeliveryOutcome, DeliveryService};
use crate::domain::schedule::DeliveryMode;
use crate::error::{AppError, AppResult};
use crate::infrastructure::lock::ScheduleLockManager;
use crate::infrastructure::repositories::{
    ObligationCounts, ObligationRepository, ScheduleRepository,
};

/// Read-only view of why a schedule is or is not delivering.
#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub schedule_id: Uuid,
    pub feed_id: Uuid,
    pub active: bool,
    pub mode: DeliveryMode,
    pub target_count: usize,
    pub blackout: BlackoutStatus,
    pub lock_available: bool,
    pub obligations: ObligationCounts,
}

pub struct ScheduleController {
    delivery_service: Arc<DeliveryService>,
    schedule_repo: Arc<ScheduleRepository>,
    obligation_repo: Arc<ObligationRepository>,
    gate: Arc<BlackoutGate>,
    lock_manager: Arc<dyn ScheduleLockManager>,
}

impl ScheduleController {
    pub fn new(
        delivery_service: Arc<DeliveryService>,
        schedule_repo: Arc<ScheduleRepository>,
        obligation_repo: Arc<ObligationRepository>,
        gate: Arc<BlackoutGate>,
        lock_manager: Arc<dyn ScheduleLockManager>,
    ) -> Self {
        Self {
            delivery_service,
            schedule_repo,
            obligation_repo,
            gate,
            lock_manager,
        }
    }

    /// POST /api/schedules/{scheduleId}/run - Drain the schedule now
    pub async fn run_schedule(
        State(controller): State<Arc<ScheduleController>>,
        Path(schedule_id): Path<Uuid>,
    ) -> AppResult<Json<DeliveryOutcome>> {
        let outcome = controller.delivery_service.run_schedule(schedule_id).await?;
        Ok(Json(outcome))
    }

    /// GET /api/schedules/{scheduleId}/diagnostics - Blocking reasons and counts
    pub async fn diagnostics(
        State(controller): State<Arc<ScheduleController>>,
        Path(schedule_id): Path<Uuid>,
    ) -> AppResult<Json<DiagnosticsResponse>> {
        let schedule = controller
            .schedule_repo
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Schedule {} not found", schedule_id)))?;

        let blackout = controller.gate.current().await;
        let obligations = controller
            .obligation_repo
            .counts_for_schedule(schedule_id)
            .await?;

        // Probe the lock without holding it.
        let lock_available = match controller.lock_manager.acquire(schedule_id).await? {
            Some(lease) => {
                controller.lock_manager.release(lease).await?;
                true
            }
            None => false,
        };

        Ok(Json(DiagnosticsResponse {
            schedule_id,
            feed_id: schedule.feed_id,
            active: schedule.active,
            mode: schedule.mode,
            target_count: schedule.targets.len(),
            blackout,
            lock_available,
            obligations,
        }))
    }

    /// POST /api/obligations/{obligationId}/approve - Release a held obligation
    pub async fn approve_obligation(
        State(controller): State<Arc<ScheduleController>>,
        Path(obligation_id): Path<Uuid>,
    ) -> AppResult<StatusCode> {
        controller
            .delivery_service
            .approve_obligation(obligation_id)
            .await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
