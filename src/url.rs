//! File ID extraction from Drive share links.

use std::sync::LazyLock;

use regex::Regex;

static PATH_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?:file|document|spreadsheets|presentation|drawings)/(?:u/\d+/)?d/([A-Za-z0-9_-]+)")
        .expect("valid regex")
});

static FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

/// Returns `true` if `s` is shaped like a bare Drive file ID.
#[must_use]
pub fn is_file_id(s: &str) -> bool {
    FILE_ID_RE.is_match(s)
}

/// Extracts a Drive file ID from a bare ID or a share URL.
///
/// Recognized forms:
/// - `https://drive.google.com/file/d/{id}/view?usp=sharing`
/// - `https://docs.google.com/document/d/{id}/edit`
/// - `https://drive.google.com/open?id={id}`
/// - `https://drive.google.com/uc?id={id}&export=download`
///
/// Returns `None` if nothing ID-like is found.
#[must_use]
pub fn extract_file_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if is_file_id(input) {
        return Some(input.to_string());
    }

    let url = url::Url::parse(input).ok()?;
    if let Some(caps) = PATH_ID_RE.captures(url.path()) {
        return Some(caps[1].to_string());
    }

    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| is_file_id(id))
}
