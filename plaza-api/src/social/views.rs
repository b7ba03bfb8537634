//! Response shapes with media keys swapped for readable URLs.

use crate::media::{MediaError, MediaStore};
use plaza_common::model::{
    Id,
    media::MediaKey,
    post::{Comment, Post, PostDescription, PostMarker},
    user::{DisplayName, User, UserMarker},
};
use serde::Serialize;
use time::OffsetDateTime;

async fn resolve(
    media: &dyn MediaStore,
    bucket: &str,
    key: Option<&MediaKey>,
) -> Result<Option<String>, MediaError> {
    match key {
        Some(key) => media.resolve_url(bucket, key).await.map(Some),
        None => Ok(None),
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub description: PostDescription,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub likes: Vec<Id<UserMarker>>,
    pub like_count: usize,
    pub comments: Vec<Comment>,
    pub comment_count: usize,
}

impl PostView {
    pub async fn resolve(
        post: Post,
        media: &dyn MediaStore,
        bucket: &str,
    ) -> Result<Self, MediaError> {
        let image = resolve(media, bucket, post.image.as_ref()).await?;

        Ok(Self {
            id: post.id,
            user_id: post.author,
            date: post.date,
            like_count: post.like_count(),
            comment_count: post.comments.len(),
            description: post.description,
            image,
            likes: post.likes,
            comments: post.comments,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct UserView {
    pub id: Id<UserMarker>,
    pub name: DisplayName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub following: Vec<Id<UserMarker>>,
    pub followers: u64,
    pub posts: u64,
}

impl UserView {
    pub async fn resolve(
        user: User,
        media: &dyn MediaStore,
        bucket: &str,
    ) -> Result<Self, MediaError> {
        let avatar = resolve(media, bucket, user.avatar.as_ref()).await?;

        Ok(Self {
            id: user.id,
            name: user.name,
            avatar,
            following: user.following,
            followers: user.followers,
            posts: user.posts,
        })
    }
}
