//! Authorization and target resolution for cache revalidation requests.

use std::sync::Arc;

use async_trait::async_trait;
use escriba_api_types::{RevalidateRequest, RevalidationTarget};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::domain::slug;
use crate::domain::types::ContentKind;

const SITEMAP_PATH: &str = "/sitemap.xml";

#[derive(Debug, Error)]
pub enum RevalidatorError {
    #[error("revalidation transport failed: {0}")]
    Transport(String),
    #[error("revalidation endpoint answered with status {status}")]
    Status { status: u16 },
}

/// External cache-invalidation collaborator.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate(&self, target: &RevalidationTarget) -> Result<(), RevalidatorError>;
}

#[derive(Debug, Error)]
pub enum RevalidateError {
    #[error("missing or invalid revalidation secret")]
    Unauthorized,
    #[error("one of `path`, `tag` or `type` is required")]
    MissingTarget,
    #[error("unknown content type `{value}`; expected `blog` or `study`")]
    UnknownType { value: String },
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to revalidate {target:?}")]
    Collaborator {
        target: RevalidationTarget,
        #[source]
        source: RevalidatorError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevalidationOutcome {
    pub targets: Vec<RevalidationTarget>,
    pub now: OffsetDateTime,
}

pub struct RevalidationService {
    secret_digest: Option<Vec<u8>>,
    revalidator: Arc<dyn Revalidator>,
}

impl RevalidationService {
    /// Without a configured secret every request is rejected.
    pub fn new(secret: Option<&str>, revalidator: Arc<dyn Revalidator>) -> Self {
        let secret_digest = secret
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(digest);
        Self {
            secret_digest,
            revalidator,
        }
    }

    /// Surrounding whitespace is ignored on both sides of the comparison.
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), RevalidateError> {
        let provided = provided.map(str::trim);
        let (Some(expected), Some(provided)) = (self.secret_digest.as_deref(), provided) else {
            return Err(RevalidateError::Unauthorized);
        };
        if expected.ct_eq(&digest(provided)).unwrap_u8() == 0 {
            return Err(RevalidateError::Unauthorized);
        }
        Ok(())
    }

    /// Check the secret, then invalidate every resolved target in order. The
    /// first collaborator failure aborts the remaining targets.
    pub async fn revalidate(
        &self,
        request: &RevalidateRequest,
    ) -> Result<RevalidationOutcome, RevalidateError> {
        self.authorize(request.secret.as_deref())?;
        let targets = resolve_targets(request)?;

        for target in &targets {
            if let Err(source) = self.revalidator.revalidate(target).await {
                warn!(
                    target = "application::revalidate",
                    revalidation_target = ?target,
                    error = %source,
                    "revalidation collaborator failed"
                );
                return Err(RevalidateError::Collaborator {
                    target: target.clone(),
                    source,
                });
            }
        }

        info!(
            target = "application::revalidate",
            count = targets.len(),
            "revalidated targets"
        );
        Ok(RevalidationOutcome {
            targets,
            now: OffsetDateTime::now_utc(),
        })
    }
}

/// Expand a request into the concrete paths and tags to invalidate, in
/// request order and without duplicates.
pub fn resolve_targets(
    request: &RevalidateRequest,
) -> Result<Vec<RevalidationTarget>, RevalidateError> {
    let mut targets = Vec::new();

    if let Some(path) = present(request.path.as_deref()) {
        if !path.starts_with('/') || path.starts_with("//") {
            return Err(RevalidateError::InvalidInput {
                field: "path",
                reason: "must be a site-relative path starting with `/`",
            });
        }
        push_unique(&mut targets, RevalidationTarget::Path(path.to_string()));
    }

    if let Some(tag) = present(request.tag.as_deref()) {
        push_unique(&mut targets, RevalidationTarget::Tag(tag.to_string()));
    }

    if let Some(value) = present(request.content_type.as_deref()) {
        let kind: ContentKind = value
            .parse()
            .map_err(|_| RevalidateError::UnknownType {
                value: value.to_string(),
            })?;
        let slug = match present(request.slug.as_deref()) {
            Some(slug) if !slug::validate(slug) => {
                return Err(RevalidateError::InvalidInput {
                    field: "slug",
                    reason: "must be lowercase alphanumerics separated by single hyphens",
                });
            }
            other => other,
        };
        for target in page_set(kind, slug) {
            push_unique(&mut targets, target);
        }
    }

    if targets.is_empty() {
        return Err(RevalidateError::MissingTarget);
    }
    Ok(targets)
}

/// Pages affected by a change to content of `kind`.
pub fn page_set(kind: ContentKind, slug: Option<&str>) -> Vec<RevalidationTarget> {
    let mut targets = match kind {
        ContentKind::Blog => vec![
            RevalidationTarget::Path("/".to_string()),
            RevalidationTarget::Path("/blog".to_string()),
            RevalidationTarget::Path(SITEMAP_PATH.to_string()),
            RevalidationTarget::Tag(kind.as_str().to_string()),
        ],
        ContentKind::Study => vec![
            RevalidationTarget::Path("/estudos".to_string()),
            RevalidationTarget::Path(SITEMAP_PATH.to_string()),
            RevalidationTarget::Tag(kind.as_str().to_string()),
        ],
    };
    if let Some(slug) = slug {
        targets.push(RevalidationTarget::Path(format!(
            "/{}/{slug}",
            kind.path_segment()
        )));
    }
    targets
}

fn digest(value: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().to_vec()
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn push_unique(targets: &mut Vec<RevalidationTarget>, target: RevalidationTarget) {
    if !targets.contains(&target) {
        targets.push(target);
    }
}
