//! Slug assignment for stored posts.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::slug::{self, SlugAsyncError, SlugError};
use crate::domain::types::ContentKind;

#[derive(Debug, Error)]
pub enum SlugAssignError {
    #[error(
        "invalid slug `{slug}`: use lowercase letters, digits and single hyphens, at most {max} characters",
        max = crate::domain::slug::MAX_SLUG_LEN
    )]
    InvalidSlug { slug: String },
    #[error("slug `{slug}` is already used by another {kind} entry")]
    Taken { slug: String, kind: ContentKind },
    #[error("title cannot be turned into a slug: {0}")]
    Title(#[source] SlugError),
    #[error(transparent)]
    Exhausted(SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct SlugService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
}

impl SlugService {
    pub fn new(reader: Arc<dyn PostsRepo>, writer: Arc<dyn PostsWriteRepo>) -> Self {
        Self { reader, writer }
    }

    /// Choose and persist the slug of `post_id`.
    ///
    /// An explicitly requested slug must already be valid and free within
    /// `kind`; it is never rewritten. Without a request the slug is derived
    /// from `title` and suffixed (`-1`, `-2`, ...) until it is unique. The
    /// post's own current slug never counts as a collision.
    pub async fn assign(
        &self,
        post_id: Uuid,
        kind: ContentKind,
        title: &str,
        requested: Option<&str>,
    ) -> Result<String, SlugAssignError> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());

        let slug = match requested {
            Some(candidate) => {
                if !slug::validate(candidate) {
                    return Err(SlugAssignError::InvalidSlug {
                        slug: candidate.to_string(),
                    });
                }
                if !self.is_available(kind, candidate, post_id).await? {
                    return Err(SlugAssignError::Taken {
                        slug: candidate.to_string(),
                        kind,
                    });
                }
                candidate.to_string()
            }
            None => {
                let base = slug::generate(title).map_err(SlugAssignError::Title)?;
                let reader = self.reader.clone();
                slug::ensure_unique_async(&base, move |candidate| {
                    let reader = reader.clone();
                    async move {
                        reader
                            .find_by_slug(kind, &candidate)
                            .await
                            .map(|existing| existing.is_none_or(|post| post.id == post_id))
                    }
                })
                .await
                .map_err(|err| match err {
                    SlugAsyncError::Slug(err) => SlugAssignError::Exhausted(err),
                    SlugAsyncError::Predicate(err) => SlugAssignError::Repo(err),
                })?
            }
        };

        debug!(
            target = "application::slugs",
            %post_id,
            kind = kind.as_str(),
            slug = %slug,
            "slug resolved"
        );
        self.writer.update_slug(post_id, &slug).await?;
        info!(
            target = "application::slugs",
            %post_id,
            kind = kind.as_str(),
            slug = %slug,
            "slug assigned"
        );
        Ok(slug)
    }

    async fn is_available(
        &self,
        kind: ContentKind,
        candidate: &str,
        post_id: Uuid,
    ) -> Result<bool, RepoError> {
        Ok(self
            .reader
            .find_by_slug(kind, candidate)
            .await?
            .is_none_or(|post| post.id == post_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PostRecord;
    use crate::infra::memory::InMemoryPostsRepo;

    fn seeded(posts: &[(ContentKind, &str)]) -> (Arc<InMemoryPostsRepo>, SlugService) {
        let repo = Arc::new(InMemoryPostsRepo::default());
        for (kind, slug) in posts {
            let mut post = PostRecord::new(Uuid::new_v4(), *kind, *slug);
            post.slug = slug.to_string();
            repo.insert(post);
        }
        let service = SlugService::new(repo.clone(), repo.clone());
        (repo, service)
    }

    fn new_post(repo: &InMemoryPostsRepo, kind: ContentKind, title: &str) -> Uuid {
        let post = PostRecord::new(Uuid::new_v4(), kind, title);
        let id = post.id;
        repo.insert(post);
        id
    }

    #[tokio::test]
    async fn generated_slug_skips_taken_values() {
        let (repo, service) = seeded(&[
            (ContentKind::Blog, "ownership-em-rust"),
            (ContentKind::Blog, "ownership-em-rust-1"),
        ]);
        let id = new_post(&repo, ContentKind::Blog, "Ownership em Rust");

        let slug = service
            .assign(id, ContentKind::Blog, "Ownership em Rust", None)
            .await
            .expect("assign");
        assert_eq!(slug, "ownership-em-rust-2");
        let stored = repo.get(id).expect("stored post");
        assert_eq!(stored.slug, "ownership-em-rust-2");
    }

    #[tokio::test]
    async fn slugs_are_scoped_by_kind() {
        let (repo, service) = seeded(&[(ContentKind::Blog, "lifetimes")]);
        let id = new_post(&repo, ContentKind::Study, "Lifetimes");
        let slug = service
            .assign(id, ContentKind::Study, "Lifetimes", None)
            .await
            .expect("assign");
        assert_eq!(slug, "lifetimes");
    }

    #[tokio::test]
    async fn reassigning_keeps_own_slug() {
        let (repo, service) = seeded(&[]);
        let id = new_post(&repo, ContentKind::Blog, "Traits");
        let first = service
            .assign(id, ContentKind::Blog, "Traits", None)
            .await
            .expect("first");
        let second = service
            .assign(id, ContentKind::Blog, "Traits", Some(&first))
            .await
            .expect("second");
        assert_eq!(first, "traits");
        assert_eq!(second, "traits");
    }

    #[tokio::test]
    async fn requested_slug_is_validated_not_rewritten() {
        let (repo, service) = seeded(&[(ContentKind::Blog, "taken")]);
        let id = new_post(&repo, ContentKind::Blog, "Anything");

        let err = service
            .assign(id, ContentKind::Blog, "Anything", Some("Bad Slug"))
            .await
            .expect_err("invalid slug");
        assert!(matches!(err, SlugAssignError::InvalidSlug { .. }));

        let err = service
            .assign(id, ContentKind::Blog, "Anything", Some("taken"))
            .await
            .expect_err("taken slug");
        assert!(matches!(err, SlugAssignError::Taken { .. }));
        assert_eq!(repo.get(id).expect("post").slug, "");
    }

    #[tokio::test]
    async fn unrepresentable_title_is_rejected() {
        let (repo, service) = seeded(&[]);
        let id = new_post(&repo, ContentKind::Blog, "???");
        let err = service
            .assign(id, ContentKind::Blog, "???", None)
            .await
            .expect_err("no slug");
        assert!(matches!(err, SlugAssignError::Title(_)));
    }

    #[tokio::test]
    async fn unknown_post_surfaces_repository_error() {
        let (_repo, service) = seeded(&[]);
        let err = service
            .assign(Uuid::new_v4(), ContentKind::Blog, "Ghost", None)
            .await
            .expect_err("missing post");
        assert!(matches!(err, SlugAssignError::Repo(RepoError::NotFound)));
    }
}
