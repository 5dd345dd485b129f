use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "text")]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Immediate,
    Interval,
    FixedTimes,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryMode::Immediate => write!(f, "immediate"),
            DeliveryMode::Interval => write!(f, "interval"),
            DeliveryMode::FixedTimes => write!(f, "fixed_times"),
        }
    }
}

/// Binds a feed to a set of delivery targets. Created and mutated
/// externally; the core only advances `last_run_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Schedule {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub targets: Vec<String>,
    pub mode: DeliveryMode,
    pub interval_secs: Option<i64>,
    /// "HH:MM" wall-clock entries, interpreted in UTC.
    pub fixed_times: Vec<String>,
    pub template: Option<String>,
    pub active: bool,
    pub requires_approval: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Whether a timer tick at `now` should run this schedule. Immediate
    /// schedules are driven by ingestion, never by the timer.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.mode {
            DeliveryMode::Immediate => false,
            DeliveryMode::Interval => match (self.interval_secs, self.last_run_at) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(secs), Some(last)) => now - last >= chrono::Duration::seconds(secs),
            },
            DeliveryMode::FixedTimes => match latest_fixed_occurrence(&self.fixed_times, now) {
                None => false,
                Some(occurrence) => self.last_run_at.map_or(true, |last| last < occurrence),
            },
        }
    }
}

/// The most recent instant at or before `now` at which any of the "HH:MM"
/// entries occurred. Malformed entries are skipped.
fn latest_fixed_occurrence(times: &[String], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    times
        .iter()
        .filter_map(|entry| NaiveTime::parse_from_str(entry.trim(), "%H:%M").ok())
        .filter_map(|time| {
            let today = Utc
                .from_local_datetime(&now.date_naive().and_time(time))
                .single()?;
            if today <= now {
                Some(today)
            } else {
                Some(today - chrono::Duration::days(1))
            }
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(mode: DeliveryMode) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            feed_id: Uuid::new_v4(),
            targets: vec!["t-1".to_string()],
            mode,
            interval_secs: None,
            fixed_times: vec![],
            template: None,
            active: true,
            requires_approval: false,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn immediate_is_never_timer_due() {
        let s = schedule(DeliveryMode::Immediate);
        assert!(!s.is_due(at(12, 0)));
    }

    #[test]
    fn interval_due_on_first_run_and_after_elapse() {
        let mut s = schedule(DeliveryMode::Interval);
        s.interval_secs = Some(3600);
        assert!(s.is_due(at(12, 0)));

        s.last_run_at = Some(at(11, 30));
        assert!(!s.is_due(at(12, 0)));
        assert!(s.is_due(at(12, 30)));
    }

    #[test]
    fn interval_without_period_is_not_due() {
        let s = schedule(DeliveryMode::Interval);
        assert!(!s.is_due(at(12, 0)));
    }

    #[test]
    fn fixed_times_due_once_per_occurrence() {
        let mut s = schedule(DeliveryMode::FixedTimes);
        s.fixed_times = vec!["09:00".to_string(), "17:00".to_string()];

        // Never run: the 09:00 occurrence has passed.
        assert!(s.is_due(at(12, 0)));

        // Ran after 09:00: nothing new until 17:00.
        s.last_run_at = Some(at(9, 5));
        assert!(!s.is_due(at(12, 0)));
        assert!(s.is_due(at(17, 0)));
    }

    #[test]
    fn malformed_fixed_times_are_skipped() {
        let mut s = schedule(DeliveryMode::FixedTimes);
        s.fixed_times = vec!["nonsense".to_string()];
        assert!(!s.is_due(at(12, 0)));
    }

    #[test]
    fn inactive_schedule_is_never_due() {
        let mut s = schedule(DeliveryMode::Interval);
        s.interval_secs = Some(60);
        s.active = false;
        assert!(!s.is_due(at(12, 0)));
    }
}
