//! Content ingestion for a publishing backend: Markdown/HTML rendering,
//! semantic validation, SEO metadata, slug assignment and a rate-limited
//! revalidation webhook.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
