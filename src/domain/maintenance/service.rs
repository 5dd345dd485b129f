use crate::domain::settings::SettingsService;
use crate::error::AppResult;
use crate::infrastructure::repositories::{FeedItemRepository, ObligationRepository};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PruneStats {
    pub obligations_deleted: u64,
    pub items_deleted: u64,
}

/// Crash recovery and housekeeping. Runs lock-free: reclaiming is a single
/// conditional update, and a reclaimed obligation re-passes the
/// already-sent guard before any resend, so a crashed worker never causes
/// a double send.
pub struct MaintenanceService {
    obligation_repo: Arc<ObligationRepository>,
    item_repo: Arc<FeedItemRepository>,
    settings: Arc<SettingsService>,
}

impl MaintenanceService {
    pub fn new(
        obligation_repo: Arc<ObligationRepository>,
        item_repo: Arc<FeedItemRepository>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            obligation_repo,
            item_repo,
            settings,
        }
    }

    /// Reset obligations abandoned mid-delivery back to `pending`.
    pub async fn reclaim_stuck(&self) -> AppResult<u64> {
        let timeout = self.settings.processing_timeout().await?;
        let cutoff = Utc::now() - timeout;

        let reclaimed = self.obligation_repo.reclaim_stuck(cutoff).await?;
        if reclaimed > 0 {
            tracing::info!(reclaimed, "reclaimed obligations stuck in processing");
        }
        Ok(reclaimed)
    }

    /// Drop expired history: terminal obligations first, then feed items
    /// past the window that no remaining obligation references.
    pub async fn prune_expired(&self) -> AppResult<PruneStats> {
        let window = self.settings.retention_window().await?;
        let cutoff = Utc::now() - window;

        let obligations_deleted = self.obligation_repo.delete_terminal_older_than(cutoff).await?;
        let items_deleted = self.item_repo.delete_expired_unreferenced(cutoff).await?;

        tracing::info!(
            obligations_deleted,
            items_deleted,
            "retention sweep finished"
        );

        Ok(PruneStats {
            obligations_deleted,
            items_deleted,
        })
    }
}
