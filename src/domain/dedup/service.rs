use crate::domain::feed::FeedItem;
use crate::domain::normalize;
use crate::infrastructure::repositories::FeedItemRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// The partition a candidate is compared against.
#[derive(Debug, Clone)]
pub enum DedupScope {
    Feed(Uuid),
    Target(String),
}

/// Decides whether a candidate item duplicates something already stored
/// within a lookback window: exact fingerprint/URL match first, then fuzzy
/// title similarity.
pub struct DedupService {
    item_repo: Arc<FeedItemRepository>,
}

impl DedupService {
    pub fn new(item_repo: Arc<FeedItemRepository>) -> Self {
        Self { item_repo }
    }

    /// A storage failure here is treated as "not a duplicate": a transient
    /// read error must not silently suppress content. The unique keys on
    /// insert absorb whatever slips through.
    pub async fn is_duplicate(
        &self,
        title: &str,
        url: &str,
        scope: &DedupScope,
        since: DateTime<Utc>,
        threshold: f64,
    ) -> bool {
        let records = match scope {
            DedupScope::Feed(feed_id) => self.item_repo.recent_for_feed(*feed_id, since).await,
            DedupScope::Target(target_id) => {
                self.item_repo.recent_for_target(target_id, since).await
            }
        };

        let records = match records {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    ?scope,
                    "dedup lookup failed, treating candidate as new"
                );
                return false;
            }
        };

        let fingerprint = normalize::fingerprint(title, url);
        let normalized_url = normalize::normalize_url(url);
        if exact_match(&fingerprint, &normalized_url, &records) {
            return true;
        }

        let normalized_title = normalize::normalize_title(title);
        best_title_similarity(&normalized_title, &records) >= threshold
    }
}

/// Exact short-circuit: a shared fingerprint or canonical URL means the same
/// content regardless of surface formatting.
fn exact_match(fingerprint: &str, normalized_url: &str, records: &[FeedItem]) -> bool {
    records.iter().any(|record| {
        record.fingerprint == fingerprint
            || (!normalized_url.is_empty() && record.url == normalized_url)
    })
}

/// Highest normalized-Levenshtein score between the candidate title and any
/// stored title; 0.0 for an empty comparison set.
fn best_title_similarity(normalized_title: &str, records: &[FeedItem]) -> f64 {
    records
        .iter()
        .map(|record| {
            strsim::normalized_levenshtein(
                normalized_title,
                &normalize::normalize_title(&record.title),
            )
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(title: &str, url: &str) -> FeedItem {
        FeedItem {
            id: Uuid::new_v4(),
            feed_id: Uuid::new_v4(),
            external_id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            url: url.to_string(),
            fingerprint: normalize::fingerprint(title, url),
            description: None,
            content: None,
            author: None,
            image_url: None,
            published_at: None,
            content_hash: None,
            categories: vec![],
            extra: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn shared_fingerprint_is_exact_match() {
        let stored = record("breaking market rally", "https://example.com/rally");
        let fp = normalize::fingerprint("Breaking: Market Rally!!", "https://example.com/rally/");
        assert!(exact_match(&fp, "https://example.com/rally", &[stored]));
    }

    #[test]
    fn shared_canonical_url_is_exact_match() {
        let stored = record("some headline", "https://example.com/a");
        let fp = normalize::fingerprint("entirely different words", "https://example.com/a");
        assert!(exact_match(&fp, "https://example.com/a", &[stored]));
    }

    #[test]
    fn empty_url_never_matches_exactly() {
        let stored = record("some headline", "");
        assert!(!exact_match("other-fp", "", &[stored]));
    }

    #[test]
    fn punctuation_variant_scores_above_default_threshold() {
        let stored = record("breaking market rally", "https://example.com/1");
        let candidate = normalize::normalize_title("Breaking: Market Rally!!");
        assert!(best_title_similarity(&candidate, &[stored]) >= 0.88);
    }

    #[test]
    fn unrelated_titles_score_below_threshold() {
        let stored = record("quarterly earnings beat expectations", "https://example.com/2");
        let candidate = normalize::normalize_title("local weather turns stormy tonight");
        assert!(best_title_similarity(&candidate, &[stored]) < 0.88);
    }

    #[test]
    fn empty_comparison_set_scores_zero() {
        assert_eq!(best_title_similarity("anything", &[]), 0.0);
    }
}
