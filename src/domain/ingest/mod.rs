pub mod service;
pub mod window;

pub use service::IngestService;
pub use window::select_window;

use serde::Serialize;
use uuid::Uuid;

/// Counters for one ingestion run over one feed. Unchanged reappearances
/// are reported under `duplicates`.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub feed_id: Uuid,
    pub fetched: u32,
    pub inserted: u32,
    pub updated: u32,
    pub duplicates: u32,
    pub errors: u32,
}

impl RunStats {
    pub fn new(feed_id: Uuid) -> Self {
        Self {
            feed_id,
            fetched: 0,
            inserted: 0,
            updated: 0,
            duplicates: 0,
            errors: 0,
        }
    }
}
