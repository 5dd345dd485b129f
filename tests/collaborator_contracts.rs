//! Wire-shape tests for the external collaborator contracts: what the
//! fetcher sidecar, messaging gateway and quiet-period source are expected
//! to speak.

use chrono::{TimeZone, Utc};
use feedrelay_backend::infrastructure::fetch::FetchOutcome;
use feedrelay_backend::infrastructure::periods::QuietPeriod;
use feedrelay_backend::infrastructure::transport::{SendReceipt, TransportStatus};
use pretty_assertions::assert_eq;

#[test]
fn minimal_fetch_response_fills_defaults() {
    let json = r#"{
        "items": [
            {"external_id": "guid-1", "title": "A headline", "url": "https://example.com/a"}
        ]
    }"#;

    let outcome: FetchOutcome = serde_json::from_str(json).expect("parse");
    assert_eq!(outcome.items.len(), 1);

    let item = &outcome.items[0];
    assert_eq!(item.external_id, "guid-1");
    assert_eq!(item.description, None);
    assert_eq!(item.categories, Vec::<String>::new());
    assert_eq!(item.extra, serde_json::json!({}));

    assert!(!outcome.meta.not_modified);
    assert_eq!(outcome.meta.etag, None);
}

#[test]
fn conditional_fetch_response_carries_validators() {
    let json = r#"{
        "items": [],
        "meta": {
            "not_modified": true,
            "etag": "\"abc123\"",
            "last_modified": "Wed, 05 Aug 2026 09:00:00 GMT",
            "detected_kind": "atom"
        }
    }"#;

    let outcome: FetchOutcome = serde_json::from_str(json).expect("parse");
    assert!(outcome.meta.not_modified);
    assert_eq!(outcome.meta.etag.as_deref(), Some("\"abc123\""));
    assert_eq!(outcome.meta.detected_kind.as_deref(), Some("atom"));
}

#[test]
fn fetched_item_timestamps_are_rfc3339() {
    let json = r#"{
        "items": [
            {
                "external_id": "guid-2",
                "title": "Timed",
                "url": "https://example.com/t",
                "published_at": "2026-08-05T07:30:00Z"
            }
        ]
    }"#;

    let outcome: FetchOutcome = serde_json::from_str(json).expect("parse");
    assert_eq!(
        outcome.items[0].published_at,
        Some(Utc.with_ymd_and_hms(2026, 8, 5, 7, 30, 0).unwrap())
    );
}

#[test]
fn gateway_receipt_and_status_shapes() {
    let receipt: SendReceipt =
        serde_json::from_str(r#"{"message_id": "wamid.123"}"#).expect("parse");
    assert_eq!(receipt.message_id, "wamid.123");

    let status: TransportStatus =
        serde_json::from_str(r#"{"status": "connected"}"#).expect("parse");
    assert_eq!(status.status, "connected");
}

#[test]
fn quiet_period_parses_with_optional_label() {
    let labelled: QuietPeriod = serde_json::from_str(
        r#"{"start": "2026-08-07T16:45:00Z", "end": "2026-08-08T17:30:00Z", "label": "weekly rest"}"#,
    )
    .expect("parse");
    assert_eq!(labelled.label.as_deref(), Some("weekly rest"));

    let bare: QuietPeriod =
        serde_json::from_str(r#"{"start": "2026-08-07T16:45:00Z", "end": "2026-08-08T17:30:00Z"}"#)
            .expect("parse");
    assert_eq!(bare.label, None);
    assert!(bare.start < bare.end);
}
