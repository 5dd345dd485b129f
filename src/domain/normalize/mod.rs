use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

/// Normalize a title for stable comparison: lowercase, strip punctuation
/// noise, collapse whitespace.
pub fn normalize_title(text: &str) -> String {
    static RE_NOISE: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    let re_noise = RE_NOISE.get_or_init(|| Regex::new(r#"[!?.,:;"'`´’“”«»()\[\]{}|]+"#).unwrap());
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());

    let lowered = text.to_lowercase();
    let stripped = re_noise.replace_all(&lowered, " ");
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

/// Canonicalize a URL: lowercased host, default ports elided, `utm_*`
/// tracking parameters removed, trailing slash stripped. The path and the
/// remaining query are left intact. Unparsable input yields an empty
/// string rather than an error.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return String::new();
    };

    // Host lowercasing and default-port elision happen at parse time; only
    // the tracking parameters need explicit handling.
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.to_lowercase().starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
    }

    url.to_string().trim_end_matches('/').to_string()
}

/// The canonical form when one exists, otherwise the trimmed raw input.
/// Stored item URLs always go through this, so lookups and comparisons see
/// one spelling per link.
pub fn canonical_url_or_raw(raw: &str) -> String {
    let canonical = normalize_url(raw);
    if canonical.is_empty() {
        raw.trim().to_string()
    } else {
        canonical
    }
}

/// Deterministic content fingerprint over the normalized title and URL.
/// Two items with the same fingerprint are treated as the same content
/// regardless of surface formatting.
pub fn fingerprint(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_title(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(normalize_url(url).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn title_is_lowercased_and_stripped() {
        assert_eq!(
            normalize_title("Breaking: Market Rally!!"),
            "breaking market rally"
        );
    }

    #[test]
    fn title_whitespace_is_collapsed() {
        assert_eq!(normalize_title("  a\t b \n c  "), "a b c");
    }

    #[test]
    fn url_strips_tracking_params_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://Example.COM/news/?utm_source=x&utm_Campaign=y"),
            "https://example.com/news"
        );
    }

    #[test]
    fn url_keeps_non_tracking_query() {
        assert_eq!(
            normalize_url("https://example.com/a?id=7&utm_medium=rss"),
            "https://example.com/a?id=7"
        );
    }

    #[test]
    fn url_elides_default_port() {
        assert_eq!(normalize_url("http://example.com:80/x"), "http://example.com/x");
        assert_eq!(
            normalize_url("https://example.com:8443/x"),
            "https://example.com:8443/x"
        );
    }

    #[test]
    fn unparsable_url_yields_empty_string() {
        assert_eq!(normalize_url("not a url"), "");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn canonical_or_raw_falls_back_to_trimmed_input() {
        assert_eq!(
            canonical_url_or_raw("https://example.com/a/"),
            "https://example.com/a"
        );
        assert_eq!(canonical_url_or_raw("  not a url  "), "not a url");
    }

    #[test]
    fn fingerprint_ignores_surface_formatting() {
        let a = fingerprint("Breaking: Market Rally!!", "https://Example.com/r/?utm_source=a");
        let b = fingerprint("breaking market rally", "https://example.com/r");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_distinguishes_content() {
        let a = fingerprint("one thing", "https://example.com/1");
        let b = fingerprint("another thing", "https://example.com/2");
        assert_ne!(a, b);
    }
}
