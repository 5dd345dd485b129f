use crate::domain::feed::FeedItem;
use html2text::from_read;
use once_cell::sync::OnceCell;
use regex::Regex;

const DEFAULT_TEMPLATE: &str = "{title}\n{url}";

/// Render the outbound message for one item from a schedule template.
/// Placeholders: `{title}`, `{url}`, `{description}`, `{author}`. Rendering
/// fields may still carry markup from the source; everything is flattened
/// to plain text before substitution.
pub fn render_message(template: Option<&str>, item: &FeedItem) -> String {
    let template = match template {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_TEMPLATE,
    };

    let rendered = template
        .replace("{title}", &plain_text(&item.title))
        .replace("{url}", item.url.trim())
        .replace("{description}", &plain_text(item.description.as_deref().unwrap_or("")))
        .replace("{author}", &plain_text(item.author.as_deref().unwrap_or("")));

    tidy(&rendered)
}

fn plain_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let flattened = from_read(text.as_bytes(), usize::MAX);
    flattened.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse the blank runs left behind by empty placeholders.
fn tidy(text: &str) -> String {
    static RE_BLANK: OnceCell<Regex> = OnceCell::new();
    let re_blank = RE_BLANK.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let trimmed_lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let joined = trimmed_lines.join("\n");
    re_blank.replace_all(&joined, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use uuid::Uuid;

    fn item() -> FeedItem {
        FeedItem {
            id: Uuid::new_v4(),
            feed_id: Uuid::new_v4(),
            external_id: "guid".to_string(),
            title: "Rates hold steady".to_string(),
            url: "https://example.com/rates".to_string(),
            fingerprint: "fp".to_string(),
            description: Some("<p>The committee left rates unchanged.</p>".to_string()),
            content: None,
            author: Some("Newsdesk".to_string()),
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
    fn default_template_is_title_and_url() {
        let message = render_message(None, &item());
        assert_eq!(message, "Rates hold steady\nhttps://example.com/rates");
    }

    #[test]
    fn placeholders_substitute_plain_text() {
        let message = render_message(Some("{title}: {description} ({author})"), &item());
        assert_eq!(
            message,
            "Rates hold steady: The committee left rates unchanged. (Newsdesk)"
        );
    }

    #[test]
    fn missing_fields_render_empty_without_stray_blanks() {
        let mut it = item();
        it.description = None;
        it.author = None;
        let message = render_message(Some("{title}\n\n\n{description}\n{author}"), &it);
        assert_eq!(message, "Rates hold steady");
    }

    #[test]
    fn blank_template_falls_back_to_default() {
        let message = render_message(Some("   "), &item());
        assert_eq!(message, "Rates hold steady\nhttps://example.com/rates");
    }
}
