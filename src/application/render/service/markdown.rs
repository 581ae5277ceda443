use comrak::{Arena, format_html, options::Options, parse_document};
use metrics::counter;
use tracing::warn;

use crate::application::render::types::RenderError;
use crate::infra::telemetry::METRIC_MARKDOWN_FALLBACK;

use super::config::default_options;

/// Comrak-backed Markdown to HTML conversion. Output is *not* sanitised.
pub struct MarkdownConverter {
    options: Options<'static>,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self {
            options: default_options(),
        }
    }

    /// Convert Markdown to HTML, degrading to the untouched source when
    /// conversion fails so content never disappears.
    pub fn to_html(&self, markdown: &str) -> String {
        match self.try_to_html(markdown) {
            Ok(html) => html,
            Err(err) => {
                counter!(METRIC_MARKDOWN_FALLBACK).increment(1);
                warn!(
                    target = "application::render::markdown",
                    error = %err,
                    input_len = markdown.len(),
                    "markdown conversion failed; serving source unchanged"
                );
                markdown.to_string()
            }
        }
    }

    /// Fallible conversion for diagnostics.
    pub fn try_to_html(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;
        Ok(html)
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_headings_lists_and_tables() {
        let converter = MarkdownConverter::new();
        let html = converter.to_html("# Title\n\n* one\n* two\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn keeps_inline_html_for_the_sanitizer() {
        let converter = MarkdownConverter::new();
        let html = converter.to_html("# Title\n\n<script>alert(1)</script>\n");

        assert!(html.contains("<script>"));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let converter = MarkdownConverter::new();
        assert_eq!(converter.to_html("").trim(), "");
    }
}
