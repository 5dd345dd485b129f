use crate::domain::settings::{BlackoutParams, SettingsService};
use crate::infrastructure::periods::{QuietPeriod, QuietPeriodSource};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Injected time source so gate evaluation is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Answer to "is delivery currently suspended, and until when".
#[derive(Debug, Clone, Serialize)]
pub struct BlackoutStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_start: Option<DateTime<Utc>>,
}

impl BlackoutStatus {
    fn inactive() -> Self {
        Self {
            active: false,
            reason: None,
            ends_at: None,
            next_start: None,
        }
    }
}

/// Consulted by the delivery worker immediately before draining a schedule.
/// Period lookups go through a short-lived cache keyed by the configuration
/// tuple so delivery ticks do not hammer the external time source.
pub struct BlackoutGate {
    period_source: Arc<dyn QuietPeriodSource>,
    settings: Arc<SettingsService>,
    clock: Arc<dyn Clock>,
    cache: Cache<BlackoutParams, Arc<Vec<QuietPeriod>>>,
}

impl BlackoutGate {
    pub fn new(
        period_source: Arc<dyn QuietPeriodSource>,
        settings: Arc<SettingsService>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            period_source,
            settings,
            clock,
            cache: Cache::builder()
                .max_capacity(16)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    /// A failure to read configuration or reach the time source degrades to
    /// "not suspended": queued work is delivered rather than held on an
    /// outage of the gate's own dependencies.
    pub async fn current(&self) -> BlackoutStatus {
        let params = match self.settings.blackout_params().await {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(error = %e, "blackout configuration unavailable, gate open");
                return BlackoutStatus::inactive();
            }
        };

        if !params.is_configured() {
            return BlackoutStatus::inactive();
        }

        let source = self.period_source.clone();
        let lookup = params.clone();
        let periods = self
            .cache
            .try_get_with(params, async move {
                source
                    .current_periods(
                        &lookup.location,
                        lookup.start_offset_min,
                        lookup.end_offset_min,
                    )
                    .await
                    .map(Arc::new)
            })
            .await;

        match periods {
            Ok(periods) => evaluate(&periods, self.clock.now()),
            Err(e) => {
                tracing::warn!(error = %e, "quiet-period lookup failed, gate open");
                BlackoutStatus::inactive()
            }
        }
    }
}

/// Pure evaluation of the period list at one instant.
fn evaluate(periods: &[QuietPeriod], now: DateTime<Utc>) -> BlackoutStatus {
    let next_start = periods
        .iter()
        .map(|p| p.start)
        .filter(|start| *start > now)
        .min();

    let current = periods
        .iter()
        .filter(|p| p.start <= now && now < p.end)
        .min_by_key(|p| p.end);

    match current {
        Some(period) => BlackoutStatus {
            active: true,
            reason: period.label.clone(),
            ends_at: Some(period.end),
            next_start,
        },
        None => BlackoutStatus {
            active: false,
            reason: None,
            ends_at: None,
            next_start,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 19, h, m, 0).unwrap()
    }

    fn period(start: DateTime<Utc>, end: DateTime<Utc>, label: &str) -> QuietPeriod {
        QuietPeriod {
            start,
            end,
            label: Some(label.to_string()),
        }
    }

    #[test]
    fn inside_a_period_is_active_with_end() {
        let periods = vec![period(at(18, 0), at(20, 0), "evening quiet")];
        let status = evaluate(&periods, at(19, 0));
        assert!(status.active);
        assert_eq!(status.ends_at, Some(at(20, 0)));
        assert_eq!(status.reason.as_deref(), Some("evening quiet"));
    }

    #[test]
    fn outside_all_periods_reports_next_start() {
        let periods = vec![
            period(at(18, 0), at(20, 0), "evening"),
            period(at(6, 0), at(7, 0), "morning"),
        ];
        let status = evaluate(&periods, at(12, 0));
        assert!(!status.active);
        assert_eq!(status.next_start, Some(at(18, 0)));
    }

    #[test]
    fn period_end_is_exclusive() {
        let periods = vec![period(at(18, 0), at(20, 0), "evening")];
        assert!(!evaluate(&periods, at(20, 0)).active);
        assert!(evaluate(&periods, at(18, 0)).active);
    }

    #[test]
    fn overlapping_periods_surface_the_earliest_end() {
        let periods = vec![
            period(at(18, 0), at(22, 0), "long"),
            period(at(18, 30), at(20, 0), "short"),
        ];
        let status = evaluate(&periods, at(19, 0));
        assert_eq!(status.ends_at, Some(at(20, 0)));
    }

    #[test]
    fn empty_periods_are_inactive() {
        let status = evaluate(&[], at(12, 0));
        assert!(!status.active);
        assert_eq!(status.next_start, None);
    }
}
