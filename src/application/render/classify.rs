//! Markdown/HTML disambiguation for content with no declared format.
//!
//! HTML signals win over Markdown heuristics so markup is never fed through
//! the Markdown converter twice; anything ambiguous is treated as HTML and
//! passes through the sanitizer untouched by conversion.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::types::ContentFormat;

static LEADING_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<[A-Za-z][^>]*>").expect("leading tag pattern must compile"));

static MARKDOWN_SIGNALS: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        r"(?m)^#{1,6}\s",
        r"(?m)^\*\s",
        r"(?m)^\d+\.\s",
        r"(?m)^>\s",
        r"```",
        r"(?m)^\|.*\|",
    ]
    .map(|pattern| Regex::new(pattern).expect("markdown signal pattern must compile"))
});

/// Decide whether `raw` should be treated as Markdown or HTML.
pub fn classify(raw: &str) -> ContentFormat {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ContentFormat::Html;
    }

    if LEADING_TAG.is_match(trimmed) {
        return ContentFormat::Html;
    }

    if MARKDOWN_SIGNALS
        .iter()
        .any(|signal| signal.is_match(trimmed))
    {
        return ContentFormat::Markdown;
    }

    ContentFormat::Html
}
