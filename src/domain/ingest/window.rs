use crate::infrastructure::fetch::FetchedItem;

/// Pick the slice of fetched candidates one run actually processes.
///
/// On a feed's very first successful run only the single most-recent item
/// (by published time) goes through, so activating a feed with a deep
/// archive does not replay history. Later runs take the most-recent
/// `window` items (0 = unbounded). The result is ordered oldest-first so
/// insert order matches publish order.
pub fn select_window(mut items: Vec<FetchedItem>, first_run: bool, window: usize) -> Vec<FetchedItem> {
    // Newest first; items without a publish time sort last.
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let keep = if first_run {
        1
    } else if window == 0 {
        items.len()
    } else {
        window
    };
    items.truncate(keep);

    items.reverse();
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn item(external_id: &str, day: u32) -> FetchedItem {
        FetchedItem {
            external_id: external_id.to_string(),
            title: format!("item {}", external_id),
            url: format!("https://example.com/{}", external_id),
            description: None,
            content: None,
            author: None,
            image_url: None,
            published_at: Some(Utc.with_ymd_and_hms(2026, 2, day, 8, 0, 0).unwrap()),
            content_hash: None,
            categories: vec![],
            extra: json!({}),
        }
    }

    #[test]
    fn first_run_keeps_only_the_most_recent() {
        let items = vec![item("a", 1), item("e", 5), item("c", 3), item("b", 2), item("d", 4)];
        let window = select_window(items, true, 500);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].external_id, "e");
    }

    #[test]
    fn later_runs_are_windowed_and_oldest_first() {
        let items = vec![item("a", 1), item("d", 4), item("b", 2), item("c", 3)];
        let window = select_window(items, false, 3);
        let ids: Vec<&str> = window.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[test]
    fn zero_window_is_unbounded() {
        let items = vec![item("a", 1), item("b", 2)];
        assert_eq!(select_window(items, false, 0).len(), 2);
    }

    #[test]
    fn unpublished_items_sort_as_oldest() {
        let mut unpublished = item("x", 1);
        unpublished.published_at = None;
        let items = vec![unpublished, item("y", 2)];
        let window = select_window(items, true, 500);
        assert_eq!(window[0].external_id, "y");
    }
}
