use crate::error::AppResult;
use crate::infrastructure::repositories::SettingsRepository;
use chrono::Duration;
use std::sync::Arc;

pub mod keys {
    pub const DEDUP_THRESHOLD: &str = "dedup_threshold";
    pub const DEDUP_WINDOW_DAYS: &str = "dedup_window_days";
    pub const RETENTION_DAYS: &str = "retention_days";
    pub const PROCESSING_TIMEOUT_MINUTES: &str = "processing_timeout_minutes";
    pub const FETCH_WINDOW: &str = "fetch_window";
    pub const SEND_DELAY_MS: &str = "send_delay_ms";
    pub const LOCK_TTL_SECS: &str = "lock_ttl_secs";
    pub const BLACKOUT_LOCATION: &str = "blackout_location";
    pub const BLACKOUT_START_OFFSET_MIN: &str = "blackout_start_offset_min";
    pub const BLACKOUT_END_OFFSET_MIN: &str = "blackout_end_offset_min";
    pub const BLACKOUT_CACHE_TTL_SECS: &str = "blackout_cache_ttl_secs";
}

/// The configuration tuple handed to the quiet-period time source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlackoutParams {
    pub location: String,
    pub start_offset_min: i64,
    pub end_offset_min: i64,
}

impl BlackoutParams {
    /// An empty location disables the gate entirely.
    pub fn is_configured(&self) -> bool {
        !self.location.trim().is_empty()
    }
}

/// Typed access to the DB-backed tunables, with defaults materialized on
/// first read. Values that fail to parse fall back to the default rather
/// than failing the caller.
pub struct SettingsService {
    settings_repo: Arc<SettingsRepository>,
}

impl SettingsService {
    pub fn new(settings_repo: Arc<SettingsRepository>) -> Self {
        Self { settings_repo }
    }

    pub async fn dedup_threshold(&self) -> AppResult<f64> {
        let raw = self
            .settings_repo
            .get_or_default(keys::DEDUP_THRESHOLD, "0.88")
            .await?;
        Ok(parse_f64_or(&raw, keys::DEDUP_THRESHOLD, 0.88).clamp(0.0, 1.0))
    }

    pub async fn dedup_window(&self) -> AppResult<Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::DEDUP_WINDOW_DAYS, "14")
            .await?;
        Ok(Duration::days(parse_i64_or(&raw, keys::DEDUP_WINDOW_DAYS, 14).max(1)))
    }

    pub async fn retention_window(&self) -> AppResult<Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::RETENTION_DAYS, "14")
            .await?;
        Ok(Duration::days(parse_i64_or(&raw, keys::RETENTION_DAYS, 14).max(1)))
    }

    /// The watchdog reclaim timeout, floored at five minutes.
    pub async fn processing_timeout(&self) -> AppResult<Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::PROCESSING_TIMEOUT_MINUTES, "30")
            .await?;
        let minutes = parse_i64_or(&raw, keys::PROCESSING_TIMEOUT_MINUTES, 30).max(5);
        Ok(Duration::minutes(minutes))
    }

    /// Rolling source-item window per ingestion run; 0 means unbounded.
    pub async fn fetch_window(&self) -> AppResult<usize> {
        let raw = self
            .settings_repo
            .get_or_default(keys::FETCH_WINDOW, "500")
            .await?;
        Ok(parse_i64_or(&raw, keys::FETCH_WINDOW, 500).max(0) as usize)
    }

    /// Pause between consecutive sends, respecting outbound rate limits.
    pub async fn send_delay(&self) -> AppResult<std::time::Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::SEND_DELAY_MS, "3000")
            .await?;
        Ok(std::time::Duration::from_millis(
            parse_i64_or(&raw, keys::SEND_DELAY_MS, 3000).max(0) as u64,
        ))
    }

    /// Lease length for the table-based schedule lock.
    pub async fn lock_ttl(&self) -> AppResult<Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::LOCK_TTL_SECS, "300")
            .await?;
        Ok(Duration::seconds(parse_i64_or(&raw, keys::LOCK_TTL_SECS, 300).max(30)))
    }

    pub async fn blackout_params(&self) -> AppResult<BlackoutParams> {
        let location = self
            .settings_repo
            .get_or_default(keys::BLACKOUT_LOCATION, "")
            .await?;
        let start_raw = self
            .settings_repo
            .get_or_default(keys::BLACKOUT_START_OFFSET_MIN, "0")
            .await?;
        let end_raw = self
            .settings_repo
            .get_or_default(keys::BLACKOUT_END_OFFSET_MIN, "0")
            .await?;

        Ok(BlackoutParams {
            location,
            start_offset_min: parse_i64_or(&start_raw, keys::BLACKOUT_START_OFFSET_MIN, 0),
            end_offset_min: parse_i64_or(&end_raw, keys::BLACKOUT_END_OFFSET_MIN, 0),
        })
    }

    pub async fn blackout_cache_ttl(&self) -> AppResult<std::time::Duration> {
        let raw = self
            .settings_repo
            .get_or_default(keys::BLACKOUT_CACHE_TTL_SECS, "21600")
            .await?;
        Ok(std::time::Duration::from_secs(
            parse_i64_or(&raw, keys::BLACKOUT_CACHE_TTL_SECS, 21600).max(60) as u64,
        ))
    }
}

fn parse_f64_or(raw: &str, key: &str, default: f64) -> f64 {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, raw, "unparsable setting, using default");
        default
    })
}

fn parse_i64_or(raw: &str, key: &str, default: i64) -> i64 {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, raw, "unparsable setting, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_numbers() {
        assert_eq!(parse_f64_or("0.92", "k", 0.88), 0.92);
        assert_eq!(parse_i64_or(" 21 ", "k", 14), 21);
    }

    #[test]
    fn falls_back_on_garbage() {
        assert_eq!(parse_f64_or("high", "k", 0.88), 0.88);
        assert_eq!(parse_i64_or("", "k", 14), 14);
    }

    #[test]
    fn unconfigured_blackout_is_detected() {
        let params = BlackoutParams {
            location: "  ".to_string(),
            start_offset_min: 0,
            end_offset_min: 0,
        };
        assert!(!params.is_configured());
    }
}
