//! Process-local store with the same conditional-write semantics as
//! [`DbClient`](crate::client::DbClient). Used for local runs and tests.

use crate::store::{AuthStore, PostStore, Result, StoreError, UserStore};
use async_trait::async_trait;
use plaza_common::{
    cursor::PostCursor,
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        post::{Post, PostMarker},
        user::{User, UserMarker},
    },
    util::PageSize,
};
use std::{
    cmp::Reverse,
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<Id<UserMarker>, User>,
    posts: HashMap<Id<PostMarker>, Post>,
    authentications: Vec<Authentication>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token hash, as the identity service would.
    pub fn insert_authentication(&self, authentication: Authentication) {
        self.lock().authentications.push(authentication);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn newest_first(
    posts: impl Iterator<Item = Post>,
    after: Option<PostCursor>,
    limit: PageSize,
) -> Vec<Post> {
    let mut page: Vec<Post> = posts
        .filter(|post| after.is_none_or(|cursor| cursor.admits(post.sort_key())))
        .collect();
    page.sort_by_key(|post| Reverse(post.sort_key()));
    page.truncate(limit.as_usize());
    page
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut state = self.lock();
        if state.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateUser(user.id));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut state = self.lock();
        let stored = state
            .users
            .get_mut(&user.id)
            .filter(|stored| stored.version == user.version)
            .ok_or_else(|| StoreError::user_conflict(user.id))?;

        *stored = User {
            version: user.version.next(),
            ..user.clone()
        };
        Ok(stored.clone())
    }

    async fn list_user_ids(&self) -> Result<Vec<Id<UserMarker>>> {
        let mut ids: Vec<_> = self.lock().users.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn count_followers(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count = self
            .lock()
            .users
            .values()
            .filter(|user| user.follows(user_id))
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.lock().posts.get(&post_id).cloned())
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        self.lock().posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        let mut state = self.lock();
        let stored = state
            .posts
            .get_mut(&post.id)
            .filter(|stored| stored.version == post.version)
            .ok_or_else(|| StoreError::post_conflict(post.id))?;

        *stored = Post {
            version: post.version.next(),
            ..post.clone()
        };
        Ok(stored.clone())
    }

    async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        let state = self.lock();
        let posts = state
            .posts
            .values()
            .filter(|post| post.author == user_id)
            .cloned();
        Ok(newest_first(posts, after, limit))
    }

    async fn fetch_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        let state = self.lock();
        let posts = state
            .posts
            .values()
            .filter(|post| authors.contains(&post.author))
            .cloned();
        Ok(newest_first(posts, after, limit))
    }

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count = self
            .lock()
            .posts
            .values()
            .filter(|post| post.author == user_id)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self
            .lock()
            .authentications
            .iter()
            .find(|authentication| authentication.token_hash == *token_hash)
            .cloned())
    }
}
