//! Semantic and SEO structure checks for authored HTML.
//!
//! Checks are pattern based rather than DOM based: every rule scans the raw
//! markup independently and treats anything it cannot locate as "no match".
//! Results are advisory; publication is never blocked here.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::util::html::{strip_tags, word_count};

/// Below this many words a page is considered too thin to index.
pub const MIN_WORD_COUNT: usize = 100;
/// Recommended minimum for articles.
pub const RECOMMENDED_WORD_COUNT: usize = 300;
/// Text longer than this without any `<p>` is flagged.
pub const PARAGRAPH_THRESHOLD_CHARS: usize = 500;

const NON_DESCRIPTIVE_LINK_TEXT: &[&str] = &[
    "here",
    "click here",
    "click",
    "read more",
    "more",
    "link",
    "this",
    "this link",
    "aqui",
    "clique aqui",
    "clique",
    "leia mais",
    "saiba mais",
    "veja mais",
    "mais",
];

static HEADING_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h([1-6])\b[^>]*>").expect("heading pattern must compile"));
static IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img pattern must compile"));
static ALT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\salt\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)
        .expect("alt pattern must compile")
});
static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a\s*>").expect("anchor pattern must compile"));
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<p[\s>]").expect("paragraph pattern must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Byte offset of the offending markup in the validated input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            element: None,
            position: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            element: None,
            position: None,
        }
    }

    pub fn at(mut self, element: impl Into<String>, position: usize) -> Self {
        self.element = Some(element.into());
        self.position = Some(position);
        self
    }
}

/// Outcome of a validation run. `is_valid` always equals `errors.is_empty()`;
/// the fields are private so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn from_issues(issues: impl IntoIterator<Item = ValidationIssue>) -> Self {
        let mut result = Self::default();
        result.extend(issues);
        result
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.extend(other.errors.into_iter().chain(other.warnings));
    }

    fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            match issue.severity {
                Severity::Error => self.errors.push(issue),
                Severity::Warning => self.warnings.push(issue),
            }
        }
        self.is_valid = self.errors.is_empty();
    }
}

#[derive(Debug, Clone)]
pub struct SemanticValidator {
    min_words: usize,
    recommended_words: usize,
    paragraph_threshold: usize,
}

impl Default for SemanticValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticValidator {
    pub fn new() -> Self {
        Self {
            min_words: MIN_WORD_COUNT,
            recommended_words: RECOMMENDED_WORD_COUNT,
            paragraph_threshold: PARAGRAPH_THRESHOLD_CHARS,
        }
    }

    /// Run every structural rule against `html`.
    pub fn validate(&self, html: &str) -> ValidationResult {
        let mut issues = Vec::new();
        check_headings(html, &mut issues);
        self.check_paragraphs(html, &mut issues);
        check_images(html, &mut issues);
        check_links(html, &mut issues);
        ValidationResult::from_issues(issues)
    }

    /// Word-count check on the text content of `text`.
    pub fn validate_length(&self, text: &str) -> ValidationResult {
        let words = word_count(text);
        let issue = if words < self.min_words {
            Some(ValidationIssue::error(format!(
                "Content is too short to index: {words} words (minimum {})",
                self.min_words
            )))
        } else if words < self.recommended_words {
            Some(ValidationIssue::warning(format!(
                "Content has {words} words; at least {} are recommended",
                self.recommended_words
            )))
        } else {
            None
        };
        ValidationResult::from_issues(issue)
    }

    fn check_paragraphs(&self, html: &str, issues: &mut Vec<ValidationIssue>) {
        let text_len = strip_tags(html).chars().count();
        if text_len > self.paragraph_threshold && !PARAGRAPH.is_match(html) {
            issues.push(ValidationIssue::warning(format!(
                "Content has {text_len} characters but no paragraph markup"
            )));
        }
    }
}

fn check_headings(html: &str, issues: &mut Vec<ValidationIssue>) {
    let mut headings: Vec<(usize, u8)> = HEADING_OPEN
        .captures_iter(html)
        .filter_map(|caps| {
            let position = caps.get(0)?.start();
            let level = caps.get(1)?.as_str().parse::<u8>().ok()?;
            Some((position, level))
        })
        .collect();
    headings.sort_by_key(|&(position, _)| position);

    let primary: Vec<usize> = headings
        .iter()
        .filter(|&&(_, level)| level == 1)
        .map(|&(position, _)| position)
        .collect();
    if primary.len() > 1 {
        issues.push(
            ValidationIssue::error(format!(
                "Found {} h1 headings; use at most one primary heading",
                primary.len()
            ))
            .at("h1", primary[1]),
        );
    }

    for pair in headings.windows(2) {
        let (_, previous) = pair[0];
        let (position, level) = pair[1];
        if level > previous + 1 {
            issues.push(
                ValidationIssue::warning(format!(
                    "Heading hierarchy skips from h{previous} to h{level}"
                ))
                .at(format!("h{level}"), position),
            );
        }
    }
}

fn check_images(html: &str, issues: &mut Vec<ValidationIssue>) {
    for (index, tag) in IMG_TAG.find_iter(html).enumerate() {
        let alt = ALT_ATTRIBUTE.captures(tag.as_str()).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|value| value.as_str().trim().to_string())
        });
        if alt.is_none_or(|alt| alt.is_empty()) {
            issues.push(
                ValidationIssue::warning(format!("Image {} is missing alt text", index + 1))
                    .at("img", tag.start()),
            );
        }
    }
}

fn check_links(html: &str, issues: &mut Vec<ValidationIssue>) {
    for (index, caps) in ANCHOR.captures_iter(html).enumerate() {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let text = strip_tags(inner.as_str()).to_lowercase();
        let text = text.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());

        let message = if text.is_empty() {
            format!("Link {} has no visible text", index + 1)
        } else if NON_DESCRIPTIVE_LINK_TEXT.contains(&text) {
            format!("Link {} uses non-descriptive text \"{text}\"", index + 1)
        } else {
            continue;
        };
        issues.push(ValidationIssue::warning(message).at("a", whole.start()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> SemanticValidator {
        SemanticValidator::new()
    }

    #[test]
    fn clean_document_is_valid_without_warnings() {
        let html = "<h1>Title</h1><h2>Part</h2><p>Text with <a href=\"/x\">useful docs</a>.</p><img src=\"a.png\" alt=\"Chart\">";
        let result = validator().validate(html);
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn multiple_primary_headings_are_an_error() {
        let result = validator().validate("<h1>A</h1><p>x</p><h1>B</h1>");
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].element.as_deref(), Some("h1"));
        assert_eq!(result.errors()[0].position, Some(17));
    }

    #[test]
    fn hierarchy_skip_is_a_single_warning() {
        let result = validator().validate("<h1>A</h1><h3>B</h3>");
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
        let warning = &result.warnings()[0];
        assert_eq!(warning.element.as_deref(), Some("h3"));
        assert_eq!(warning.position, Some(10));
        assert!(warning.message.contains("h3"));
    }

    #[test]
    fn stepping_back_up_the_hierarchy_is_fine() {
        let result = validator().validate("<h1>A</h1><h2>B</h2><h3>C</h3><h2>D</h2><h3>E</h3>");
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn long_content_without_paragraphs_warns() {
        let html = format!("<div>{}</div>", "word ".repeat(200));
        let result = validator().validate(&html);
        assert!(result.is_valid());
        assert!(
            result
                .warnings()
                .iter()
                .any(|w| w.message.contains("no paragraph markup"))
        );

        let with_p = format!("<p>{}</p>", "word ".repeat(200));
        assert!(validator().validate(&with_p).warnings().is_empty());
    }

    #[test]
    fn each_image_without_alt_warns_with_ordinal() {
        let html = "<img src=\"a.png\" alt=\"ok\"><img src=\"b.png\"><img src='c.png' alt=' '><img data-alt=\"x\" src=\"d.png\">";
        let result = validator().validate(html);
        let messages: Vec<&str> = result
            .warnings()
            .iter()
            .map(|w| w.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Image 2 is missing alt text",
                "Image 3 is missing alt text",
                "Image 4 is missing alt text",
            ]
        );
    }

    #[test]
    fn non_descriptive_and_empty_links_warn() {
        let html = "<a href=\"/a\">Click here</a> <a href=\"/b\"><img src=\"x.png\" alt=\"x\"></a> <a href=\"/c\">Guia de Rust</a> <a href=\"/d\">aqui.</a>";
        let result = validator().validate(html);
        let links: Vec<&ValidationIssue> = result
            .warnings()
            .iter()
            .filter(|w| w.element.as_deref() == Some("a"))
            .collect();
        assert_eq!(links.len(), 3);
        assert!(links[0].message.contains("click here"));
        assert!(links[1].message.contains("no visible text"));
        assert!(links[2].message.contains("aqui"));
    }

    #[test]
    fn malformed_markup_degrades_to_no_matches() {
        let result = validator().validate("<h1 <img <a href=\"x\">unterminated <p");
        assert!(result.is_valid());
    }

    #[test]
    fn length_floor_is_an_error() {
        let result = validator().validate_length(&"word ".repeat(50));
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].message.contains("too short to index"));
    }

    #[test]
    fn below_recommended_length_is_only_a_warning() {
        let result = validator().validate_length(&"word ".repeat(150));
        assert!(result.is_valid());
        assert!(result.errors().is_empty());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn long_enough_text_passes_length_check() {
        let result = validator().validate_length(&format!("<p>{}</p>", "word ".repeat(300)));
        assert!(result.is_valid());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn merge_preserves_validity_invariant() {
        let mut result = validator().validate("<h1>A</h1>");
        assert!(result.is_valid());
        result.merge(validator().validate_length("short"));
        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn serializes_with_camel_case_validity_flag() {
        let json = serde_json::to_value(validator().validate_length("short")).expect("json");
        assert_eq!(json["isValid"], serde_json::json!(false));
        assert_eq!(json["errors"][0]["severity"], "error");
    }
}
