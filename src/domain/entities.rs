//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::ContentKind;

/// Post attributes as stored by the content repository. SEO overrides are
/// optional and take precedence over the derived values when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: Uuid,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ContentKind,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub og_title: Option<String>,
    #[serde(default)]
    pub og_description: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    #[serde(default)]
    pub noindex: bool,
    #[serde(default)]
    pub nofollow: bool,
    #[serde(default)]
    pub schema_type: Option<String>,
}

impl PostRecord {
    /// Minimal record with every optional attribute unset.
    pub fn new(id: Uuid, kind: ContentKind, title: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            kind,
            title: title.into(),
            slug: String::new(),
            content: String::new(),
            excerpt: None,
            description: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            author: None,
            cover_image: None,
            created_at: now,
            updated_at: now,
            meta_title: None,
            meta_description: None,
            canonical_url: None,
            og_title: None,
            og_description: None,
            og_image: None,
            noindex: false,
            nofollow: false,
            schema_type: None,
        }
    }
}
