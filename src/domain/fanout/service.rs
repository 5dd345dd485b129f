use crate::domain::delivery::ObligationStatus;
use crate::domain::feed::FeedItem;
use crate::domain::schedule::Schedule;
use crate::error::AppResult;
use crate::infrastructure::repositories::{NewObligation, ObligationRepository, ScheduleRepository};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Turns newly inserted or changed feed items into per-target delivery
/// obligations for every active schedule bound to the feed. Inserts are
/// idempotent under the (schedule, item, target) key, so overlapping polls
/// fanning out the same items never create duplicates.
pub struct FanoutService {
    schedule_repo: Arc<ScheduleRepository>,
    obligation_repo: Arc<ObligationRepository>,
}

impl FanoutService {
    pub fn new(
        schedule_repo: Arc<ScheduleRepository>,
        obligation_repo: Arc<ObligationRepository>,
    ) -> Self {
        Self {
            schedule_repo,
            obligation_repo,
        }
    }

    /// Returns the number of obligations actually created.
    pub async fn fan_out(&self, feed_id: Uuid, items: &[FeedItem]) -> AppResult<u64> {
        if items.is_empty() {
            return Ok(0);
        }

        let schedules = self.schedule_repo.find_active_by_feed(feed_id).await?;
        let item_ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();

        let mut created = 0u64;
        for schedule in schedules {
            if schedule.targets.is_empty() {
                continue;
            }

            let existing = self
                .obligation_repo
                .existing_pairs(schedule.id, &item_ids, &schedule.targets)
                .await?;

            let missing = missing_pairs(&item_ids, &schedule.targets, &existing);
            if missing.is_empty() {
                continue;
            }

            let status = initial_status(&schedule);
            let obligations: Vec<NewObligation> = missing
                .into_iter()
                .map(|(feed_item_id, target_id)| NewObligation {
                    schedule_id: schedule.id,
                    feed_item_id,
                    target_id,
                    status,
                })
                .collect();

            let inserted = self.obligation_repo.insert_ignore(&obligations).await?;
            created += inserted;

            tracing::debug!(
                schedule_id = %schedule.id,
                feed_id = %feed_id,
                inserted,
                "fan-out created obligations"
            );
        }

        Ok(created)
    }
}

/// The (item, target) pairs with no existing obligation yet, in item order
/// then target order.
fn missing_pairs(
    item_ids: &[Uuid],
    targets: &[String],
    existing: &[(Uuid, String)],
) -> Vec<(Uuid, String)> {
    let taken: HashSet<(&Uuid, &str)> = existing
        .iter()
        .map(|(item, target)| (item, target.as_str()))
        .collect();

    let mut missing = Vec::new();
    for item_id in item_ids {
        for target in targets {
            if !taken.contains(&(item_id, target.as_str())) {
                missing.push((*item_id, target.clone()));
            }
        }
    }
    missing
}

fn initial_status(schedule: &Schedule) -> ObligationStatus {
    if schedule.requires_approval {
        ObligationStatus::AwaitingApproval
    } else {
        ObligationStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_pairs_missing_when_nothing_exists() {
        let items = vec![Uuid::new_v4(), Uuid::new_v4()];
        let targets = vec!["a".to_string(), "b".to_string()];
        let missing = missing_pairs(&items, &targets, &[]);
        assert_eq!(missing.len(), 4);
    }

    #[test]
    fn existing_pairs_are_excluded() {
        let item = Uuid::new_v4();
        let targets = vec!["a".to_string(), "b".to_string()];
        let existing = vec![(item, "a".to_string())];
        let missing = missing_pairs(&[item], &targets, &existing);
        assert_eq!(missing, vec![(item, "b".to_string())]);
    }

    #[test]
    fn fully_covered_input_yields_nothing() {
        let item = Uuid::new_v4();
        let targets = vec!["a".to_string()];
        let existing = vec![(item, "a".to_string())];
        assert!(missing_pairs(&[item], &targets, &existing).is_empty());
    }
}
