use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthenticatedIdentity;
use crate::db::models::{Post, PostId, PostListing};
use crate::error::{AppError, AppResult};
use crate::posts::ownership::{self, Decision};
use crate::posts::store::{PostStore, UserStore};

/// Payload for creating a post. Title and url are validated here
/// rather than by serde so a missing field yields a 400, not a 422.
#[derive(Debug, Deserialize)]
pub struct PostDraft {
    pub title: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub likes: Option<i64>,
}

/// Full replacement payload for an update. The caller submits the
/// intended new like total; the pipeline applies it verbatim.
#[derive(Debug, Deserialize)]
pub struct PostPatch {
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub likes: i64,
}

/// Orchestrates the authorization-gated mutations. Identity resolution
/// happens before construction of any call into this service, so every
/// method assumes an already-verified identity.
pub struct PostService {
    users: Arc<dyn UserStore>,
    posts: Arc<dyn PostStore>,
}

impl PostService {
    pub fn new(users: Arc<dyn UserStore>, posts: Arc<dyn PostStore>) -> Self {
        Self { users, posts }
    }

    pub async fn list(&self) -> AppResult<Vec<PostListing>> {
        Ok(self.posts.find_all_with_owners().await?)
    }

    pub async fn create(
        &self,
        identity: AuthenticatedIdentity,
        draft: PostDraft,
    ) -> AppResult<Post> {
        let title = required(draft.title, "title")?;
        let url = required(draft.url, "url")?;
        let likes = draft.likes.unwrap_or(0);
        if likes < 0 {
            return Err(AppError::Validation("likes must be non-negative".into()));
        }

        let mut user = self
            .users
            .find_by_id(&identity.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let post = Post {
            id: PostId::generate(),
            title,
            author: draft.author,
            url,
            likes,
            owner_id: user.id,
        };

        // Two-phase write: the post first, then the owner's index. No
        // transaction spans the two, so a failure in between leaves a
        // post the owner's index does not know about.
        self.posts.insert(&post).await?;

        user.post_ids.push(post.id);
        self.users.save(&user).await.map_err(|e| {
            AppError::PartialWrite(format!(
                "post {} saved but owner index update failed: {}",
                post.id, e
            ))
        })?;

        Ok(post)
    }

    pub async fn update(
        &self,
        identity: AuthenticatedIdentity,
        post_id: PostId,
        patch: PostPatch,
    ) -> AppResult<Post> {
        if patch.title.is_empty() {
            return Err(AppError::Validation("title is required".into()));
        }
        if patch.url.is_empty() {
            return Err(AppError::Validation("url is required".into()));
        }
        if patch.likes < 0 {
            return Err(AppError::Validation("likes must be non-negative".into()));
        }

        let post = self
            .posts
            .find_by_id(&post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if ownership::authorize(&identity, &post.owner_id) == Decision::Deny {
            return Err(AppError::Forbidden);
        }

        let updated = Post {
            id: post.id,
            title: patch.title,
            author: patch.author,
            url: patch.url,
            likes: patch.likes,
            owner_id: post.owner_id,
        };

        self.posts
            .update_by_id(&post_id, &updated)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn delete(&self, identity: AuthenticatedIdentity, post_id: PostId) -> AppResult<()> {
        let post = self
            .posts
            .find_by_id(&post_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if ownership::authorize(&identity, &post.owner_id) == Decision::Deny {
            return Err(AppError::Forbidden);
        }

        let mut owner = self
            .users
            .find_by_id(&post.owner_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !self.posts.delete_by_id(&post_id).await? {
            return Err(AppError::NotFound);
        }

        // Second phase: drop the back-reference so no dangling id remains.
        owner.post_ids.retain(|id| *id != post_id);
        self.users.save(&owner).await.map_err(|e| {
            AppError::PartialWrite(format!(
                "post {} deleted but owner index update failed: {}",
                post_id, e
            ))
        })?;

        Ok(())
    }
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{User, UserId};
    use crate::posts::store::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct MemUserStore {
        rows: Mutex<Vec<User>>,
        fail_save: AtomicBool,
    }

    impl MemUserStore {
        fn new(users: Vec<User>) -> Self {
            Self {
                rows: Mutex::new(users),
                fail_save: AtomicBool::new(false),
            }
        }

        fn get(&self, id: &UserId) -> Option<User> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == *id)
                .cloned()
        }
    }

    #[async_trait]
    impl UserStore for MemUserStore {
        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
            Ok(self.get(id))
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn insert(&self, user: &User) -> Result<(), StoreError> {
            self.rows.lock().unwrap().push(user.clone());
            Ok(())
        }

        async fn save(&self, user: &User) -> Result<(), StoreError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(StoreError::Sql(rusqlite::Error::ExecuteReturnedResults));
            }
            let mut rows = self.rows.lock().unwrap();
            if let Some(existing) = rows.iter_mut().find(|u| u.id == user.id) {
                *existing = user.clone();
            }
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<User>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    struct MemPostStore {
        rows: Mutex<Vec<Post>>,
    }

    impl MemPostStore {
        fn new() -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
            }
        }

        fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PostStore for MemPostStore {
        async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == *id)
                .cloned())
        }

        async fn insert(&self, post: &Post) -> Result<(), StoreError> {
            self.rows.lock().unwrap().push(post.clone());
            Ok(())
        }

        async fn update_by_id(
            &self,
            id: &PostId,
            post: &Post,
        ) -> Result<Option<Post>, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|p| p.id == *id) {
                Some(existing) => {
                    *existing = post.clone();
                    Ok(Some(post.clone()))
                }
                None => Ok(None),
            }
        }

        async fn delete_by_id(&self, id: &PostId) -> Result<bool, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|p| p.id != *id);
            Ok(rows.len() < before)
        }

        async fn find_all(&self) -> Result<Vec<Post>, StoreError> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn find_all_with_owners(&self) -> Result<Vec<PostListing>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn test_user() -> User {
        User {
            id: UserId::generate(),
            username: "root".to_string(),
            name: None,
            password_hash: "hash".to_string(),
            post_ids: vec![],
        }
    }

    fn identity(user: &User) -> AuthenticatedIdentity {
        AuthenticatedIdentity { user_id: user.id }
    }

    fn draft(title: Option<&str>, url: Option<&str>, likes: Option<i64>) -> PostDraft {
        PostDraft {
            title: title.map(String::from),
            author: Some("NT".to_string()),
            url: url.map(String::from),
            likes,
        }
    }

    struct Fixture {
        users: Arc<MemUserStore>,
        posts: Arc<MemPostStore>,
        service: PostService,
        owner: User,
    }

    fn fixture() -> Fixture {
        let owner = test_user();
        let users = Arc::new(MemUserStore::new(vec![owner.clone()]));
        let posts = Arc::new(MemPostStore::new());
        let service = PostService::new(users.clone(), posts.clone());
        Fixture {
            users,
            posts,
            service,
            owner,
        }
    }

    #[tokio::test]
    async fn create_persists_post_and_back_reference() {
        let fx = fixture();

        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();

        assert_eq!(post.likes, 3);
        assert_eq!(post.owner_id, fx.owner.id);
        assert_eq!(fx.posts.len(), 1);
        assert_eq!(fx.users.get(&fx.owner.id).unwrap().post_ids, vec![post.id]);
    }

    #[tokio::test]
    async fn create_defaults_likes_to_zero() {
        let fx = fixture();

        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), None),
            )
            .await
            .unwrap();

        assert_eq!(post.likes, 0);
    }

    #[tokio::test]
    async fn create_requires_title_and_url() {
        let fx = fixture();

        for bad in [
            draft(None, Some("www.google.ba"), Some(5)),
            draft(Some("Test Title"), None, Some(5)),
            draft(Some(""), Some("www.google.ba"), None),
            draft(Some("Test Title"), Some(""), None),
        ] {
            let err = fx.service.create(identity(&fx.owner), bad).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(fx.posts.len(), 0);
    }

    #[tokio::test]
    async fn create_rejects_negative_likes() {
        let fx = fixture();

        let err = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(-1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_for_unknown_user_is_not_found() {
        let fx = fixture();

        let ghost = AuthenticatedIdentity {
            user_id: UserId::generate(),
        };
        let err = fx
            .service
            .create(ghost, draft(Some("Test Title"), Some("www.google.ba"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
        assert_eq!(fx.posts.len(), 0);
    }

    #[tokio::test]
    async fn create_surfaces_partial_write() {
        let fx = fixture();
        fx.users.fail_save.store(true, Ordering::SeqCst);

        let err = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), None),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PartialWrite(_)));
        // Documented intermediate state: the post exists but the
        // owner's index does not reference it.
        assert_eq!(fx.posts.len(), 1);
        assert!(fx.users.get(&fx.owner.id).unwrap().post_ids.is_empty());
    }

    #[tokio::test]
    async fn update_applies_exact_like_total() {
        let fx = fixture();
        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();

        let patch = PostPatch {
            title: "Test Title".to_string(),
            author: Some("NT".to_string()),
            url: "www.google.ba".to_string(),
            likes: 4,
        };
        let updated = fx
            .service
            .update(identity(&fx.owner), post.id, patch)
            .await
            .unwrap();

        // The caller already computed current + 1; no extra increment.
        assert_eq!(updated.likes, 4);
        assert_eq!(updated.owner_id, fx.owner.id);
    }

    #[tokio::test]
    async fn update_by_non_owner_is_forbidden() {
        let fx = fixture();
        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();

        let intruder = test_user();
        fx.users.insert(&intruder).await.unwrap();

        let patch = PostPatch {
            title: "Hijacked".to_string(),
            author: None,
            url: "www.example.com".to_string(),
            likes: 100,
        };
        let err = fx
            .service
            .update(identity(&intruder), post.id, patch)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        let stored = fx.posts.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Test Title");
    }

    #[tokio::test]
    async fn update_of_missing_post_is_not_found() {
        let fx = fixture();

        let patch = PostPatch {
            title: "Test Title".to_string(),
            author: None,
            url: "www.google.ba".to_string(),
            likes: 1,
        };
        let err = fx
            .service
            .update(identity(&fx.owner), PostId::generate(), patch)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn delete_removes_post_and_back_reference() {
        let fx = fixture();
        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();

        fx.service
            .delete(identity(&fx.owner), post.id)
            .await
            .unwrap();

        assert_eq!(fx.posts.len(), 0);
        assert!(fx.users.get(&fx.owner.id).unwrap().post_ids.is_empty());
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden() {
        let fx = fixture();
        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();

        let intruder = test_user();
        fx.users.insert(&intruder).await.unwrap();

        let err = fx
            .service
            .delete(identity(&intruder), post.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden));
        assert_eq!(fx.posts.len(), 1);
    }

    #[tokio::test]
    async fn delete_surfaces_partial_write() {
        let fx = fixture();
        let post = fx
            .service
            .create(
                identity(&fx.owner),
                draft(Some("Test Title"), Some("www.google.ba"), Some(3)),
            )
            .await
            .unwrap();
        fx.users.fail_save.store(true, Ordering::SeqCst);

        let err = fx
            .service
            .delete(identity(&fx.owner), post.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PartialWrite(_)));
        // The post is gone but the owner's index still references it.
        assert_eq!(fx.posts.len(), 0);
        assert_eq!(fx.users.get(&fx.owner.id).unwrap().post_ids, vec![post.id]);
    }
}
