use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One upcoming quiet interval as reported by the external time source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuietPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PeriodSourceError {
    #[error("quiet-period lookup failed: {0}")]
    Request(String),

    #[error("quiet-period source returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Contract with the recurring-schedule time source. The computation behind
/// it is opaque: given a location and two offset parameters it returns the
/// upcoming start/end intervals.
#[async_trait]
pub trait QuietPeriodSource: Send + Sync {
    async fn current_periods(
        &self,
        location: &str,
        start_offset_min: i64,
        end_offset_min: i64,
    ) -> Result<Vec<QuietPeriod>, PeriodSourceError>;
}

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP adapter to the quiet-period API.
pub struct HttpQuietPeriodSource {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpQuietPeriodSource {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeriodsResponse {
    periods: Vec<QuietPeriod>,
}

#[async_trait]
impl QuietPeriodSource for HttpQuietPeriodSource {
    async fn current_periods(
        &self,
        location: &str,
        start_offset_min: i64,
        end_offset_min: i64,
    ) -> Result<Vec<QuietPeriod>, PeriodSourceError> {
        let endpoint = format!("{}/periods", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(&endpoint)
            .timeout(LOOKUP_TIMEOUT)
            .query(&[
                ("location", location.to_string()),
                ("start_offset_min", start_offset_min.to_string()),
                ("end_offset_min", end_offset_min.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PeriodSourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PeriodSourceError::Upstream { status, body });
        }

        response
            .json::<PeriodsResponse>()
            .await
            .map(|r| r.periods)
            .map_err(|e| PeriodSourceError::Request(format!("invalid periods response: {}", e)))
    }
}
