//! Process-local post storage for tests and embedding callers.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::ContentKind;

#[derive(Default)]
pub struct InMemoryPostsRepo {
    posts: RwLock<HashMap<Uuid, PostRecord>>,
}

impl InMemoryPostsRepo {
    pub fn new(posts: impl IntoIterator<Item = PostRecord>) -> Self {
        Self {
            posts: RwLock::new(posts.into_iter().map(|post| (post.id, post)).collect()),
        }
    }

    pub fn insert(&self, post: PostRecord) {
        self.write().insert(post.id, post);
    }

    pub fn get(&self, id: Uuid) -> Option<PostRecord> {
        self.read().get(&id).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, PostRecord>> {
        self.posts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, PostRecord>> {
        self.posts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PostsRepo for InMemoryPostsRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.get(id))
    }

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .read()
            .values()
            .find(|post| post.kind == kind && post.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryPostsRepo {
    async fn update_slug(&self, id: Uuid, slug: &str) -> Result<PostRecord, RepoError> {
        let mut posts = self.write();
        let kind = posts.get(&id).map(|post| post.kind).ok_or(RepoError::NotFound)?;
        let conflict = posts
            .values()
            .any(|post| post.id != id && post.kind == kind && post.slug == slug);
        if conflict {
            return Err(RepoError::Duplicate {
                constraint: "posts_kind_slug_key".to_string(),
            });
        }
        let post = posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.slug = slug.to_string();
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_slug_enforces_per_kind_uniqueness() {
        let mut blog = PostRecord::new(Uuid::new_v4(), ContentKind::Blog, "A");
        blog.slug = "shared".to_string();
        let other_blog = PostRecord::new(Uuid::new_v4(), ContentKind::Blog, "B");
        let study = PostRecord::new(Uuid::new_v4(), ContentKind::Study, "C");
        let repo = InMemoryPostsRepo::new([blog, other_blog.clone(), study.clone()]);

        let err = repo
            .update_slug(other_blog.id, "shared")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));

        let updated = repo.update_slug(study.id, "shared").await.expect("study");
        assert_eq!(updated.slug, "shared");
        let found = repo
            .find_by_slug(ContentKind::Study, "shared")
            .await
            .expect("lookup")
            .expect("found");
        assert_eq!(found.id, study.id);
    }
}
