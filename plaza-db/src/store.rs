//! Storage contracts shared by the Postgres client and the in-memory store.
//!
//! Every `update_*` is a conditional write: it only succeeds while the stored
//! entity still carries the [`Version`](plaza_common::model::Version) that the
//! caller read, and fails with [`StoreError::Conflict`] otherwise. The written
//! entity is returned with its bumped version.

use async_trait::async_trait;
use plaza_common::{
    cursor::PostCursor,
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        post::{Post, PostMarker},
        user::{User, UserMarker},
    },
    util::PageSize,
};
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("The {entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: uuid::Uuid },
    #[error("User {0} already exists")]
    DuplicateUser(Id<UserMarker>),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    #[must_use]
    pub fn user_conflict(user_id: Id<UserMarker>) -> Self {
        Self::Conflict {
            entity: "user",
            id: user_id.uuid(),
        }
    }

    #[must_use]
    pub fn post_conflict(post_id: Id<PostMarker>) -> Self {
        Self::Conflict {
            entity: "post",
            id: post_id.uuid(),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Profiles and the follow graph.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn create_user(&self, user: &User) -> Result<()>;

    async fn update_user(&self, user: &User) -> Result<User>;

    async fn list_user_ids(&self) -> Result<Vec<Id<UserMarker>>>;

    /// Number of users whose following set contains `user_id`.
    async fn count_followers(&self, user_id: Id<UserMarker>) -> Result<u64>;
}

/// Posts with their likes and comments.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, post: &Post) -> Result<()>;

    async fn update_post(&self, post: &Post) -> Result<Post>;

    /// Posts of one author, newest first, strictly after `after`.
    async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>>;

    /// Posts of any of `authors`, newest first, strictly after `after`.
    async fn fetch_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>>;

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64>;
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;
}

pub trait Store: UserStore + PostStore + AuthStore {}

impl<T: UserStore + PostStore + AuthStore> Store for T {}
