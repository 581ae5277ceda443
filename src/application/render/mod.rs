//! Content rendering: format classification, Markdown conversion, and
//! allow-list sanitisation composed into a single pipeline.
//!
//! Every stage is pure. The pipeline never fails: conversion errors degrade
//! to the raw source and sanitisation degrades unsafe input into a safe
//! subset.

mod classify;
mod service;
mod types;

pub use classify::classify;
pub use service::{
    ALT_PLACEHOLDER, ContentPipeline, HtmlSanitizer, MarkdownConverter, PipelineConfig,
    PipelineConfigError, configure_content_pipeline, content_pipeline,
};
pub use types::{ContentDocument, RenderError, RenderedContent};
