//! Own-history and home feeds, paged newest first with [`PostCursor`]s.

use crate::{
    media::{MediaError, MediaStore},
    social::views::PostView,
};
use plaza_common::{
    cursor::PostCursor,
    model::{Id, post::Post, user::UserMarker},
    util::PageSize,
};
use plaza_db::store::{Store, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub count: usize,
    pub items: Vec<PostView>,
    /// Only set when the page came back full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

pub struct FeedAggregator<'a> {
    store: &'a dyn Store,
    media: &'a dyn MediaStore,
    post_bucket: &'a str,
    page_size: PageSize,
}

impl<'a> FeedAggregator<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        media: &'a dyn MediaStore,
        post_bucket: &'a str,
        page_size: PageSize,
    ) -> Self {
        Self {
            store,
            media,
            post_bucket,
            page_size,
        }
    }

    /// Posts authored by `user_id`.
    ///
    /// A cursor taken from some other user's history does not position this
    /// one and is ignored.
    pub async fn user_history(
        &self,
        user_id: Id<UserMarker>,
        cursor: Option<PostCursor>,
    ) -> Result<FeedPage, FeedError> {
        self.store
            .fetch_user(user_id)
            .await?
            .ok_or(FeedError::UserNotFound(user_id))?;

        let cursor = cursor.filter(|cursor| cursor.user_id == user_id);
        let posts = self
            .store
            .fetch_user_posts(user_id, cursor, self.page_size)
            .await?;

        debug!(%user_id, posts = posts.len(), "Read user history page");
        self.page(posts).await
    }

    /// Posts by everyone `viewer_id` follows, and by the viewer.
    pub async fn home_feed(
        &self,
        viewer_id: Id<UserMarker>,
        cursor: Option<PostCursor>,
    ) -> Result<FeedPage, FeedError> {
        let viewer = self
            .store
            .fetch_user(viewer_id)
            .await?
            .ok_or(FeedError::UserNotFound(viewer_id))?;

        let authors = viewer.feed_authors();
        let posts = self
            .store
            .fetch_posts_by_authors(&authors, cursor, self.page_size)
            .await?;

        debug!(%viewer_id, authors = authors.len(), posts = posts.len(), "Read home feed page");
        self.page(posts).await
    }

    async fn page(&self, posts: Vec<Post>) -> Result<FeedPage, FeedError> {
        let next_cursor = if posts.len() == self.page_size.as_usize() {
            posts.last().map(|post| post.cursor().encode())
        } else {
            None
        };

        let mut items = Vec::with_capacity(posts.len());
        for post in posts {
            items.push(PostView::resolve(post, self.media, self.post_bucket).await?);
        }

        Ok(FeedPage {
            count: items.len(),
            items,
            next_cursor,
        })
    }
}
