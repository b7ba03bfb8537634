use plaza_common::model::{
    ModelValidationError, Version,
    auth::Authentication,
    counter_from_i64,
    media::MediaKey,
    post::{Comment, Post, PostDescription},
    user::{DisplayName, User},
};
use sqlx::{FromRow, types::Json};
use time::{Duration, OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

#[derive(Clone, Debug, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub following: Vec<Uuid>,
    pub followers: i64,
    pub posts: i64,
    pub version: i64,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct PostRecord {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub date: OffsetDateTime,
    pub description: String,
    pub image: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Json<Vec<Comment>>,
    pub version: i64,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            name: DisplayName::new(value.name)?,
            avatar: value.avatar.map(MediaKey::new).transpose()?,
            following: value.following.into_iter().map(Into::into).collect(),
            followers: counter_from_i64(value.followers)?,
            posts: counter_from_i64(value.posts)?,
            version: Version::new(value.version),
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.post_id.into(),
            author: value.user_id.into(),
            date: value.date,
            description: PostDescription::new(value.description)?,
            image: value.image.map(MediaKey::new).transpose()?,
            likes: value.likes.into_iter().map(Into::into).collect(),
            comments: value.comments.0,
            version: Version::new(value.version),
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| {
                    if seconds > 0 {
                        Ok(Duration::seconds(seconds))
                    } else {
                        Err(ModelValidationError::NonPositiveExpiry(seconds))
                    }
                })
                .transpose()?,
        })
    }
}
