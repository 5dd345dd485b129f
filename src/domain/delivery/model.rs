use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    AwaitingApproval,
    Pending,
    Processing,
    Sent,
    Failed,
}

impl std::fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObligationStatus::AwaitingApproval => write!(f, "awaiting_approval"),
            ObligationStatus::Pending => write!(f, "pending"),
            ObligationStatus::Processing => write!(f, "processing"),
            ObligationStatus::Sent => write!(f, "sent"),
            ObligationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One queued unit of delivery work: "this feed item must be delivered to
/// this target under this schedule". At most one row exists per
/// (schedule, item, target) triple.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveryObligation {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub feed_item_id: Uuid,
    pub target_id: String,
    pub status: ObligationStatus,
    pub rendered_content: Option<String>,
    pub error: Option<String>,
    pub transport_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}
