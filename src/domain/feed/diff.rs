use chrono::{DateTime, Utc};

use super::model::FeedItem;
use crate::infrastructure::fetch::FetchedItem;

/// The comparable fields of an item, as a replacement set. Applied in place
/// when any field differs from the stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content_hash: Option<String>,
    pub categories: Vec<String>,
}

impl ItemPatch {
    /// The stored item as it looks after this patch lands, fingerprint
    /// recomputed from the patched title and URL.
    pub fn apply_to(&self, existing: &FeedItem, now: DateTime<Utc>) -> FeedItem {
        FeedItem {
            title: self.title.clone(),
            url: self.url.clone(),
            fingerprint: crate::domain::normalize::fingerprint(&self.title, &self.url),
            description: self.description.clone(),
            content: self.content.clone(),
            author: self.author.clone(),
            image_url: self.image_url.clone(),
            published_at: self.published_at,
            content_hash: self.content_hash.clone(),
            categories: self.categories.clone(),
            updated_at: now,
            ..existing.clone()
        }
    }
}

/// Compare a stored item against a freshly fetched one over the fixed set of
/// comparable fields. Returns `None` when nothing material changed, or the
/// patch to apply when at least one field differs.
///
/// Comparison is normalization-insensitive: text is whitespace-collapsed,
/// category lists are sorted and deduplicated, timestamps are compared as
/// UTC instants.
pub fn item_diff(existing: &FeedItem, incoming: &FetchedItem) -> Option<ItemPatch> {
    let incoming_url = crate::domain::normalize::canonical_url_or_raw(&incoming.url);
    let changed = !text_eq(&existing.title, &incoming.title)
        || !text_eq(&existing.url, &incoming_url)
        || !opt_text_eq(existing.description.as_deref(), incoming.description.as_deref())
        || !opt_text_eq(existing.content.as_deref(), incoming.content.as_deref())
        || !opt_text_eq(existing.author.as_deref(), incoming.author.as_deref())
        || !opt_text_eq(existing.image_url.as_deref(), incoming.image_url.as_deref())
        || existing.published_at != incoming.published_at
        || !opt_text_eq(existing.content_hash.as_deref(), incoming.content_hash.as_deref())
        || normalized_categories(&existing.categories) != normalized_categories(&incoming.categories);

    if !changed {
        return None;
    }

    Some(ItemPatch {
        title: incoming.title.clone(),
        url: incoming_url,
        description: incoming.description.clone(),
        content: incoming.content.clone(),
        author: incoming.author.clone(),
        image_url: incoming.image_url.clone(),
        published_at: incoming.published_at,
        content_hash: incoming.content_hash.clone(),
        categories: incoming.categories.clone(),
    })
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_eq(a: &str, b: &str) -> bool {
    collapse_ws(a) == collapse_ws(b)
}

fn opt_text_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => text_eq(a, b),
        // An empty string and an absent value carry the same information.
        (Some(present), None) | (None, Some(present)) => present.trim().is_empty(),
    }
}

fn normalized_categories(categories: &[String]) -> Vec<String> {
    let mut out: Vec<String> = categories
        .iter()
        .map(|c| collapse_ws(c).to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn stored() -> FeedItem {
        FeedItem {
            id: Uuid::new_v4(),
            feed_id: Uuid::new_v4(),
            external_id: "guid-1".to_string(),
            title: "A title".to_string(),
            url: "https://example.com/a".to_string(),
            fingerprint: "fp".to_string(),
            description: Some("Some   text".to_string()),
            content: None,
            author: Some("jane".to_string()),
            image_url: None,
            published_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()),
            content_hash: None,
            categories: vec!["News".to_string(), "markets".to_string()],
            extra: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fetched() -> FetchedItem {
        FetchedItem {
            external_id: "guid-1".to_string(),
            title: "A title".to_string(),
            url: "https://example.com/a".to_string(),
            description: Some("Some text".to_string()),
            content: None,
            author: Some("jane".to_string()),
            image_url: None,
            published_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()),
            content_hash: None,
            categories: vec!["markets".to_string(), "news".to_string()],
            extra: serde_json::json!({}),
        }
    }

    #[test]
    fn equal_items_produce_no_patch() {
        assert_eq!(item_diff(&stored(), &fetched()), None);
    }

    #[test]
    fn whitespace_only_changes_are_not_material() {
        let mut incoming = fetched();
        incoming.title = "A  \t title".to_string();
        assert_eq!(item_diff(&stored(), &incoming), None);
    }

    #[test]
    fn category_order_and_case_are_not_material() {
        let mut incoming = fetched();
        incoming.categories = vec!["MARKETS".to_string(), "News".to_string(), "news".to_string()];
        assert_eq!(item_diff(&stored(), &incoming), None);
    }

    #[test]
    fn title_change_produces_patch() {
        let mut incoming = fetched();
        incoming.title = "A better title".to_string();
        let patch = item_diff(&stored(), &incoming).expect("patch");
        assert_eq!(patch.title, "A better title");
    }

    #[test]
    fn published_at_change_produces_patch() {
        let mut incoming = fetched();
        incoming.published_at = Some(Utc.with_ymd_and_hms(2026, 1, 6, 9, 30, 0).unwrap());
        assert!(item_diff(&stored(), &incoming).is_some());
    }

    #[test]
    fn empty_string_equals_absent() {
        let mut incoming = fetched();
        incoming.content = Some(String::new());
        assert_eq!(item_diff(&stored(), &incoming), None);
    }
}
