//! Video URL detection and thumbnail helpers.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://(?:www\.|m\.|music\.)?(?:youtube\.com|youtu\.be)/[^\s"'<>\[\](){}]+"#)
        .expect("valid regex")
});

static VIDEO_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(youtube\.com|youtu\.be)/.+").expect("valid regex"));

/// Returns true if a search query looks like a direct video link rather than
/// free-text search terms.
///
/// Such queries are expected to resolve to a single result, which is then
/// selected automatically.
#[must_use]
pub fn is_video_url(query: &str) -> bool {
    VIDEO_QUERY_RE.is_match(query.trim())
}

/// Extracts video URLs from arbitrary input text, preserving first-seen order
/// and dropping duplicates.
#[must_use]
pub fn extract_video_urls(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    VIDEO_URL_RE
        .find_iter(input)
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Returns the default thumbnail URL for a video id.
#[must_use]
pub fn default_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")
}
