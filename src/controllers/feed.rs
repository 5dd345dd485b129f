use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::ingest::{IngestService, RunStats};
use crate::error::AppResult;

pub struct FeedController {
    ingest_service: Arc<IngestService>,
}

impl FeedController {
    pub fn new(ingest_service: Arc<IngestService>) -> Self {
        Self { ingest_service }
    }

    /// POST /api/feeds/{feedId}/process - Poll one feed now
    pub async fn process_feed(
        State(controller): State<Arc<FeedController>>,
        Path(feed_id): Path<Uuid>,
    ) -> AppResult<Json<RunStats>> {
        let stats = controller.ingest_service.process_feed(feed_id).await?;
        Ok(Json(stats))
    }

    /// POST /api/feeds/process - Poll every active feed now
    pub async fn process_all(
        State(controller): State<Arc<FeedController>>,
    ) -> AppResult<Json<Vec<RunStats>>> {
        let stats = controller.ingest_service.process_all_active().await?;
        Ok(Json(stats))
    }
}
