mod config;
mod markdown;
mod sanitize;

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use thiserror::Error;

use crate::application::render::classify::classify;
use crate::application::render::types::{ContentDocument, RenderedContent};
use crate::application::validation::{SemanticValidator, ValidationResult};
use crate::domain::types::ContentFormat;

pub use markdown::MarkdownConverter;
pub use sanitize::{ALT_PLACEHOLDER, HtmlSanitizer};

/// The only sanctioned path from raw author input to displayable HTML:
/// classify (unless a format is declared), convert Markdown, then sanitise.
///
/// Every stage is pure; one pipeline can serve any number of threads.
pub struct ContentPipeline {
    converter: MarkdownConverter,
    sanitizer: HtmlSanitizer,
    validator: SemanticValidator,
}

impl ContentPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            converter: MarkdownConverter::new(),
            sanitizer: HtmlSanitizer::new(&config.site_url),
            validator: SemanticValidator::new(),
        }
    }

    /// Render raw content into safe HTML. Empty input short-circuits to an
    /// empty string without touching the converter or the sanitiser.
    pub fn render(&self, raw: &str, format_hint: Option<ContentFormat>) -> String {
        if raw.trim().is_empty() {
            return String::new();
        }

        let format = format_hint.unwrap_or_else(|| classify(raw));
        match format {
            ContentFormat::Markdown => {
                let converted = self.converter.to_html(raw);
                self.sanitizer.sanitize(&converted)
            }
            ContentFormat::Html => self.sanitizer.sanitize(raw),
        }
    }

    pub fn render_document(&self, document: &ContentDocument) -> RenderedContent {
        let format = document
            .declared_format
            .unwrap_or_else(|| classify(&document.raw));
        RenderedContent {
            html: self.render(&document.raw, Some(format)),
            format,
        }
    }

    /// Authoring feedback for a document. Validates the markup as the author
    /// wrote it (Markdown is converted but not sanitised) so that sanitiser
    /// rewrites such as alt backfill do not hide problems.
    pub fn audit(&self, document: &ContentDocument) -> ValidationResult {
        let format = document
            .declared_format
            .unwrap_or_else(|| classify(&document.raw));
        let markup = match format {
            ContentFormat::Markdown => self.converter.to_html(&document.raw),
            ContentFormat::Html => document.raw.clone(),
        };

        let mut result = self.validator.validate(&markup);
        result.merge(self.validator.validate_length(&markup));
        result
    }

    pub fn converter(&self) -> &MarkdownConverter {
        &self.converter
    }

    pub fn sanitizer(&self) -> &HtmlSanitizer {
        &self.sanitizer
    }

    pub fn validator(&self) -> &SemanticValidator {
        &self.validator
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Public site URL; its host decides which links count as external.
    pub site_url: String,
}

impl From<&crate::config::SiteSettings> for PipelineConfig {
    fn from(settings: &crate::config::SiteSettings) -> Self {
        Self {
            site_url: settings.url.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineConfigError {
    #[error("content pipeline already configured")]
    AlreadyConfigured,
}

static PIPELINE_CONFIG: OnceCell<PipelineConfig> = OnceCell::new();

static CONTENT_PIPELINE: Lazy<Arc<ContentPipeline>> =
    Lazy::new(|| Arc::new(ContentPipeline::new(&active_pipeline_config())));

/// Record the process-wide pipeline configuration. Must run before the first
/// call to [`content_pipeline`].
pub fn configure_content_pipeline(config: PipelineConfig) -> Result<(), PipelineConfigError> {
    PIPELINE_CONFIG
        .set(config)
        .map_err(|_| PipelineConfigError::AlreadyConfigured)
}

/// Access the shared pipeline instance, initialised on first use.
pub fn content_pipeline() -> Arc<ContentPipeline> {
    Arc::clone(&CONTENT_PIPELINE)
}

fn active_pipeline_config() -> PipelineConfig {
    PIPELINE_CONFIG.get().cloned().unwrap_or_default()
}
