//! Result URL extraction from backend responses

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("URL pattern is valid"));

const TRAILING_PUNCTUATION: &[char] = &[')', '.', ',', ';', ']', '}', '>'];

/// Trim whitespace, surrounding quotes and trailing punctuation from a URL.
pub fn sanitize_url(url: &str) -> String {
    url.trim()
        .trim_matches(['"', '\''])
        .trim_end_matches(TRAILING_PUNCTUATION)
        .to_string()
}

/// Find the image URL in free-form (streamed) text.
///
/// A `data:` URI at the start wins and is returned verbatim; a leading
/// `http(s)://` URL is sanitized; otherwise the first embedded URL is used.
pub fn extract_url_from_text(text: &str) -> Option<String> {
    let candidate = text.trim();
    if candidate.is_empty() {
        return None;
    }
    if candidate.starts_with("data:") {
        return Some(candidate.to_string());
    }
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(sanitize_url(candidate));
    }
    URL_PATTERN
        .find(candidate)
        .map(|m| sanitize_url(m.as_str()))
}

/// Extract the result from a `{data: [{url | b64_json}]}` body.
///
/// Any `url` entry is preferred over `b64_json`, which is returned as a PNG
/// data URI.
pub fn extract_image_url(body: &Value) -> Option<String> {
    let items = body.get("data").and_then(Value::as_array)?;

    let url = items
        .iter()
        .filter_map(|item| item.get("url").and_then(Value::as_str))
        .find(|url| !url.trim().is_empty());
    if let Some(url) = url {
        return Some(sanitize_url(url));
    }

    items
        .iter()
        .filter_map(|item| item.get("b64_json").and_then(Value::as_str))
        .find(|b64| !b64.is_empty())
        .map(|b64| format!("data:image/png;base64,{b64}"))
}
