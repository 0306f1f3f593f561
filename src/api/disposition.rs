//! Content-Disposition filename extraction.

use std::sync::LazyLock;

use regex::Regex;

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="?([^";]+)"?"#).expect("valid regex"));

/// Extracts the suggested filename from a Content-Disposition header value.
///
/// Accepts both `filename="name.ext"` and the unquoted token form. Path
/// components are stripped so a hostile header cannot escape the download
/// directory. Returns `None` when no usable name is present.
#[must_use]
pub fn parse_filename(header_value: &str) -> Option<String> {
    let raw = FILENAME_RE.captures(header_value)?.get(1)?.as_str().trim();
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
