use super::window::select_window;
use super::RunStats;
use crate::domain::dedup::{DedupScope, DedupService};
use crate::domain::delivery::DeliveryService;
use crate::domain::fanout::FanoutService;
use crate::domain::feed::{item_diff, Feed, FeedItem};
use crate::domain::normalize;
use crate::domain::schedule::DeliveryMode;
use crate::domain::settings::SettingsService;
use crate::error::{AppError, AppResult};
use crate::infrastructure::fetch::{FeedFetcher, FetchMeta, FetchRequest, FetchedItem};
use crate::infrastructure::repositories::{FeedItemRepository, FeedRepository, ScheduleRepository};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

enum CandidateOutcome {
    Inserted(FeedItem),
    Updated(FeedItem),
    Duplicate,
    Unchanged,
    /// No usable identity (neither external id nor URL); dropped.
    Unusable,
}

struct CompletedRun {
    stats: RunStats,
    changed: Vec<FeedItem>,
    meta: FetchMeta,
}

/// Consumes freshly fetched candidate items for a feed, classifies each as
/// insert, update, unchanged or duplicate, persists accordingly, and hands
/// the changed records to fan-out. Per-run bookkeeping lands on the feed
/// row either way: cursors and cleared errors on success, error text and a
/// failure streak on failure.
pub struct IngestService {
    feed_repo: Arc<FeedRepository>,
    item_repo: Arc<FeedItemRepository>,
    schedule_repo: Arc<ScheduleRepository>,
    fetcher: Arc<dyn FeedFetcher>,
    dedup: Arc<DedupService>,
    fanout: Arc<FanoutService>,
    delivery: Arc<DeliveryService>,
    settings: Arc<SettingsService>,
}

impl IngestService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed_repo: Arc<FeedRepository>,
        item_repo: Arc<FeedItemRepository>,
        schedule_repo: Arc<ScheduleRepository>,
        fetcher: Arc<dyn FeedFetcher>,
        dedup: Arc<DedupService>,
        fanout: Arc<FanoutService>,
        delivery: Arc<DeliveryService>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            feed_repo,
            item_repo,
            schedule_repo,
            fetcher,
            dedup,
            fanout,
            delivery,
            settings,
        }
    }

    pub async fn process_feed(&self, feed_id: Uuid) -> AppResult<RunStats> {
        let feed = self
            .feed_repo
            .find_by_id(feed_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Feed {} not found", feed_id)))?;

        self.process(&feed).await
    }

    pub async fn process_all_active(&self) -> AppResult<Vec<RunStats>> {
        let feeds = self.feed_repo.find_active().await?;
        let mut all = Vec::with_capacity(feeds.len());
        for feed in feeds {
            all.push(self.process(&feed).await?);
        }
        Ok(all)
    }

    /// One poll for one feed. Run errors are converted into feed-row state
    /// and counters; only bookkeeping failures propagate.
    pub async fn process(&self, feed: &Feed) -> AppResult<RunStats> {
        match self.run(feed).await {
            Ok(run) => {
                self.feed_repo
                    .record_success(
                        feed.id,
                        run.meta.etag.as_deref(),
                        run.meta.last_modified.as_deref(),
                        run.meta.detected_kind.as_deref(),
                        Utc::now(),
                    )
                    .await?;

                let mut stats = run.stats;
                if !run.changed.is_empty() {
                    match self.fanout.fan_out(feed.id, &run.changed).await {
                        Ok(_) => self.run_immediate_schedules(feed.id).await,
                        Err(e) => {
                            tracing::warn!(feed_id = %feed.id, error = %e, "fan-out failed");
                            stats.errors += 1;
                        }
                    }
                }

                tracing::info!(
                    feed_id = %feed.id,
                    fetched = stats.fetched,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    duplicates = stats.duplicates,
                    errors = stats.errors,
                    "feed processed"
                );
                Ok(stats)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(feed_id = %feed.id, error = %message, "feed run failed");
                self.feed_repo
                    .record_failure(feed.id, &message, Utc::now())
                    .await?;

                let mut stats = RunStats::new(feed.id);
                stats.errors = 1;
                Ok(stats)
            }
        }
    }

    async fn run(&self, feed: &Feed) -> AppResult<CompletedRun> {
        let request = FetchRequest {
            url: feed.url.clone(),
            kind: feed.kind.clone(),
            etag: feed.etag.clone(),
            last_modified: feed.last_modified.clone(),
        };

        let outcome = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|e| AppError::ExternalService(e.to_string()))?;

        let mut stats = RunStats::new(feed.id);
        if outcome.meta.not_modified {
            return Ok(CompletedRun {
                stats,
                changed: vec![],
                meta: outcome.meta,
            });
        }

        let first_run = feed.last_success_at.is_none() && !self.item_repo.any_for_feed(feed.id).await?;
        let window = self.settings.fetch_window().await?;
        let candidates = select_window(outcome.items, first_run, window);
        stats.fetched = candidates.len() as u32;

        let threshold = self.settings.dedup_threshold().await?;
        let since = Utc::now() - self.settings.dedup_window().await?;
        let scope = DedupScope::Feed(feed.id);

        let mut changed = Vec::new();
        for candidate in &candidates {
            match self
                .apply_candidate(feed, candidate, &scope, since, threshold)
                .await
            {
                Ok(CandidateOutcome::Inserted(item)) => {
                    stats.inserted += 1;
                    changed.push(item);
                }
                Ok(CandidateOutcome::Updated(item)) => {
                    stats.updated += 1;
                    changed.push(item);
                }
                Ok(CandidateOutcome::Duplicate) | Ok(CandidateOutcome::Unchanged) => {
                    stats.duplicates += 1;
                }
                Ok(CandidateOutcome::Unusable) => {
                    stats.errors += 1;
                }
                Err(e) if e.is_foreign_key_violation() => {
                    // The feed vanished under us; whatever was written stays
                    // written and the rest of this run is abandoned.
                    tracing::warn!(feed_id = %feed.id, "feed deleted mid-run, aborting remaining candidates");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(CompletedRun {
            stats,
            changed,
            meta: outcome.meta,
        })
    }

    async fn apply_candidate(
        &self,
        feed: &Feed,
        candidate: &FetchedItem,
        scope: &DedupScope,
        since: DateTime<Utc>,
        threshold: f64,
    ) -> AppResult<CandidateOutcome> {
        let external_id = candidate.external_id.trim();
        let stored_url = normalize::canonical_url_or_raw(&candidate.url);

        let identity = if !external_id.is_empty() {
            external_id.to_string()
        } else if !stored_url.is_empty() {
            stored_url.clone()
        } else {
            return Ok(CandidateOutcome::Unusable);
        };

        let existing = match self.item_repo.find_by_external_id(feed.id, &identity).await? {
            Some(item) => Some(item),
            None if !stored_url.is_empty() => {
                self.item_repo.find_by_url(feed.id, &stored_url).await?
            }
            None => None,
        };

        match existing {
            None => {
                if self
                    .dedup
                    .is_duplicate(&candidate.title, &candidate.url, scope, since, threshold)
                    .await
                {
                    return Ok(CandidateOutcome::Duplicate);
                }

                let now = Utc::now();
                let item = FeedItem {
                    id: Uuid::new_v4(),
                    feed_id: feed.id,
                    external_id: identity,
                    title: candidate.title.trim().to_string(),
                    url: stored_url,
                    fingerprint: normalize::fingerprint(&candidate.title, &candidate.url),
                    description: candidate.description.clone(),
                    content: candidate.content.clone(),
                    author: candidate.author.clone(),
                    image_url: candidate.image_url.clone(),
                    published_at: candidate.published_at,
                    content_hash: candidate.content_hash.clone(),
                    categories: candidate.categories.clone(),
                    extra: candidate.extra.clone(),
                    created_at: now,
                    updated_at: now,
                };

                self.item_repo.insert(&item).await?;
                Ok(CandidateOutcome::Inserted(item))
            }
            Some(existing) => match item_diff(&existing, candidate) {
                Some(patch) => {
                    let now = Utc::now();
                    self.item_repo.update(existing.id, &patch, now).await?;
                    Ok(CandidateOutcome::Updated(patch.apply_to(&existing, now)))
                }
                None => Ok(CandidateOutcome::Unchanged),
            },
        }
    }

    async fn run_immediate_schedules(&self, feed_id: Uuid) {
        let schedules = match self.schedule_repo.find_active_by_feed(feed_id).await {
            Ok(schedules) => schedules,
            Err(e) => {
                tracing::warn!(feed_id = %feed_id, error = %e, "immediate schedule lookup failed");
                return;
            }
        };

        for schedule in schedules
            .into_iter()
            .filter(|s| s.mode == DeliveryMode::Immediate)
        {
            match self.delivery.run_schedule(schedule.id).await {
                Ok(outcome) => tracing::debug!(
                    schedule_id = %schedule.id,
                    sent = outcome.sent,
                    skipped = outcome.skipped,
                    "immediate delivery run"
                ),
                Err(e) => tracing::warn!(
                    schedule_id = %schedule.id,
                    error = %e,
                    "immediate delivery run failed"
                ),
            }
        }
    }
}
