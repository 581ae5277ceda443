//! Pattern-based helpers for extracting plain text from HTML fragments.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern must compile"));
static SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("script pattern must compile")
});

/// Strip markup, decode the common entities, and collapse whitespace.
pub fn strip_tags(html: &str) -> String {
    let without_scripts = SCRIPT_PATTERN.replace_all(html, " ");
    let without_tags = TAG_PATTERN.replace_all(&without_scripts, " ");
    let decoded = decode_basic_entities(&without_tags);
    collapse_whitespace(&decoded)
}

/// Number of whitespace-separated words in the text content of `html`.
pub fn word_count(html: &str) -> usize {
    strip_tags(html).split_whitespace().count()
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_basic_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
