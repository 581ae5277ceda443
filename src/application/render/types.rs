use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::ContentFormat;

/// Author-supplied content entering the pipeline. Consumed once per render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDocument {
    /// Raw Markdown or HTML captured from the editor.
    pub raw: String,
    /// Format declared by the author, if any. Skips classification when set.
    #[serde(default)]
    pub declared_format: Option<ContentFormat>,
}

impl ContentDocument {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            declared_format: None,
        }
    }

    pub fn with_format(mut self, format: ContentFormat) -> Self {
        self.declared_format = Some(format);
        self
    }
}

/// Sanitised rendering result, safe to inject into a trusted template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedContent {
    pub html: String,
    /// Format as declared or detected.
    pub format: ContentFormat,
}

/// Structured errors surfaced by the conversion stage. The pipeline itself
/// never returns them; they are logged and the stage degrades instead.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("markdown conversion failed: {message}")]
    Markdown { message: String },
    #[error("document rewriting failed: {message}")]
    Document { message: String },
}
