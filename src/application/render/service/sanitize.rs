use std::{borrow::Cow, collections::BTreeSet};

use ammonia::Builder as AmmoniaBuilder;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use tracing::warn;
use url::Url;

use crate::application::render::types::RenderError;

use super::config::build_sanitizer;

/// Alt text given to images that carry neither `alt` nor `title`.
pub const ALT_PLACEHOLDER: &str = "Image";

const EXTERNAL_REL: &[&str] = &["noopener", "noreferrer"];

/// Allow-list sanitiser followed by the structural rewrite rules:
///
/// 1. links to hosts other than the site's own open in a new browsing
///    context with `rel="noopener noreferrer"`;
/// 2. images without alt text receive one from `title`, or [`ALT_PLACEHOLDER`].
///
/// `sanitize` is idempotent and never fails.
pub struct HtmlSanitizer {
    cleaner: AmmoniaBuilder<'static>,
    site_host: Option<String>,
}

impl HtmlSanitizer {
    /// Build a sanitiser that treats links to `site_url`'s host as internal.
    /// An unparsable or empty site URL makes every absolute link external.
    pub fn new(site_url: &str) -> Self {
        let site_host = Url::parse(site_url.trim())
            .ok()
            .and_then(|url| url.host_str().map(normalize_host));

        Self {
            cleaner: build_sanitizer(),
            site_host,
        }
    }

    pub fn site_host(&self) -> Option<&str> {
        self.site_host.as_deref()
    }

    pub fn sanitize(&self, html: &str) -> String {
        let cleaned = self.cleaner.clean(html).to_string();

        match apply_rewrite_rules(&cleaned, self.site_host.as_deref()) {
            Ok(rewritten) => rewritten,
            Err(err) => {
                // The allow-listed output is already safe; only the hardening is lost.
                warn!(
                    target = "application::render::sanitize",
                    error = %err,
                    "rewrite rules failed; returning allow-listed html"
                );
                cleaned
            }
        }
    }
}

fn apply_rewrite_rules(html: &str, site_host: Option<&str>) -> Result<String, RenderError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("a[href]", move |el| {
                    let Some(href) = el.get_attribute("href") else {
                        return Ok(());
                    };
                    if is_external_link(&href, site_host) {
                        el.set_attribute("target", "_blank")?;
                        let rel = merge_rel(el.get_attribute("rel"), EXTERNAL_REL);
                        el.set_attribute("rel", &rel)?;
                    }
                    Ok(())
                }),
                element!("img", |el| {
                    let has_alt = el
                        .get_attribute("alt")
                        .is_some_and(|alt| !alt.trim().is_empty());
                    if !has_alt {
                        let fallback = el
                            .get_attribute("title")
                            .map(|title| title.trim().to_string())
                            .filter(|title| !title.is_empty())
                            .unwrap_or_else(|| ALT_PLACEHOLDER.to_string());
                        el.set_attribute("alt", &fallback)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Document {
        message: err.to_string(),
    })
}

fn is_external_link(href: &str, site_host: Option<&str>) -> bool {
    let href = href.trim();
    let candidate: Cow<'_, str> = if href.starts_with("//") {
        Cow::Owned(format!("https:{href}"))
    } else {
        Cow::Borrowed(href)
    };

    // Relative references fail to parse and are internal by definition.
    let Ok(url) = Url::parse(&candidate) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };

    match site_host {
        Some(site) => normalize_host(host) != site,
        None => true,
    }
}

fn normalize_host(host: &str) -> String {
    let lower = host.to_ascii_lowercase();
    lower
        .strip_prefix("www.")
        .map(str::to_string)
        .unwrap_or(lower)
}

fn merge_rel(existing: Option<String>, required: &[&str]) -> String {
    let mut tokens: BTreeSet<String> = existing
        .unwrap_or_default()
        .split_whitespace()
        .map(|token| token.to_ascii_lowercase())
        .collect();
    for &token in required {
        tokens.insert(token.to_string());
    }
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> HtmlSanitizer {
        HtmlSanitizer::new("https://www.example.com")
    }

    #[test]
    fn strips_scripts_and_keeps_paragraphs() {
        let html = sanitizer().sanitize("<script>alert(1)</script><p>ok</p>");
        assert!(!html.contains("script"));
        assert!(html.contains("<p>ok</p>"));
    }

    #[test]
    fn unwraps_disallowed_tags_but_keeps_text() {
        let html = sanitizer().sanitize("<p><font color=\"red\">kept</font> text</p>");
        assert_eq!(html, "<p>kept text</p>");
    }

    #[test]
    fn drops_disallowed_attributes_and_schemes() {
        let html = sanitizer().sanitize(
            "<p onclick=\"x()\" style=\"color:red\" class=\"lead\">a</p><a href=\"javascript:alert(1)\">b</a>",
        );
        assert!(html.contains("<p class=\"lead\">a</p>"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("style"));
        assert!(!html.contains("javascript"));
    }

    #[test]
    fn hardens_external_links() {
        let html = sanitizer().sanitize("<a href=\"https://other.example/x\">go</a>");
        assert!(html.contains("target=\"_blank\""));
        assert!(html.contains("rel=\"noopener noreferrer\""));
    }

    #[test]
    fn merges_existing_rel_tokens() {
        let html =
            sanitizer().sanitize("<a href=\"https://other.example/x\" rel=\"nofollow\">go</a>");
        assert!(html.contains("rel=\"nofollow noopener noreferrer\""));
    }

    #[test]
    fn leaves_internal_links_alone() {
        let html = sanitizer().sanitize(
            "<a href=\"/blog/post\">a</a><a href=\"https://example.com/x\">b</a><a href=\"mailto:me@example.com\">c</a>",
        );
        assert!(!html.contains("target="));
        assert!(!html.contains("noopener"));
    }

    #[test]
    fn backfills_alt_text() {
        let html = sanitizer().sanitize(
            "<img src=\"/a.png\" title=\"Diagram\"><img src=\"/b.png\"><img src=\"/c.png\" alt=\"Kept\">",
        );
        assert!(html.contains("alt=\"Diagram\""));
        assert!(html.contains(&format!("alt=\"{ALT_PLACEHOLDER}\"")));
        assert!(html.contains("alt=\"Kept\""));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "<script>alert(1)</script><p>ok</p>",
            "<a href=\"https://other.example/x\" rel=\"nofollow\">go</a>",
            "<div><img src=\"/b.png\" title=\"t\"><h2 id=\"x\">Head</h2></div>",
            "<table><tr><td>1</td></tr></table><unknown>text</unknown>",
            "plain text & entities &lt;b&gt;",
        ];
        let sanitizer = sanitizer();
        for input in inputs {
            let once = sanitizer.sanitize(input);
            let twice = sanitizer.sanitize(&once);
            assert_eq!(once, twice, "not idempotent for `{input}`");
        }
    }

    #[test]
    fn missing_site_url_treats_absolute_links_as_external() {
        let sanitizer = HtmlSanitizer::new("");
        assert!(sanitizer.site_host().is_none());
        let html = sanitizer.sanitize("<a href=\"https://example.com\">x</a>");
        assert!(html.contains("target=\"_blank\""));
    }
}
