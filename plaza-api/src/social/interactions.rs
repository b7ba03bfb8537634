//! Writes outside the toggles: profile edits, comments and new posts.

use crate::social::{
    InteractionError, UserCounter,
    retry_on_conflict,
    toggle::{ToggleEngine, require_user},
};
use plaza_common::{
    model::{
        Id,
        media::MediaKey,
        post::{Comment, CommentText, Post, PostMarker},
        user::{DisplayName, User, UserMarker},
    },
    toggle::ToggleOutcome,
};
use plaza_db::store::Store;
use time::OffsetDateTime;
use tracing::{error, info};

/// Changes name and/or avatar of `user_id`, leaving anything `None` as is.
pub async fn update_profile(
    store: &dyn Store,
    user_id: Id<UserMarker>,
    name: Option<DisplayName>,
    avatar: Option<MediaKey>,
) -> Result<User, InteractionError> {
    let user = retry_on_conflict("profile", || {
        let name = name.clone();
        let avatar = avatar.clone();
        async move {
            let mut user = require_user(store, user_id).await?;
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(avatar) = avatar {
                user.avatar = Some(avatar);
            }
            Ok(store.update_user(&user).await?)
        }
    })
    .await?;

    info!(%user_id, "Updated profile");
    Ok(user)
}

/// Appends a comment by `author_id`, copying their current display name.
pub async fn append_comment(
    store: &dyn Store,
    post_id: Id<PostMarker>,
    author_id: Id<UserMarker>,
    text: CommentText,
    date: OffsetDateTime,
) -> Result<Post, InteractionError> {
    let author = require_user(store, author_id).await?;

    let post = retry_on_conflict("comment", || {
        let comment = Comment {
            user_id: author.id,
            user_name: author.name.clone(),
            date,
            comment: text.clone(),
        };
        async move {
            let mut post = store
                .fetch_post(post_id)
                .await?
                .ok_or(InteractionError::PostNotFound(post_id))?;

            post.comments.push(comment);
            Ok(store.update_post(&post).await?)
        }
    })
    .await?;

    info!(%post_id, %author_id, comments = post.comments.len(), "Added comment");
    Ok(post)
}

/// Stores `post` and counts it on its author's profile.
///
/// The post itself is authoritative; if the count cannot be bumped afterwards
/// the post stays and the error is a consistency error.
pub async fn publish_post(store: &dyn Store, post: Post) -> Result<Post, InteractionError> {
    let author = require_user(store, post.author).await?;
    store.create_post(&post).await?;

    if let Err(err) = ToggleEngine::new(store)
        .adjust_counter(author, UserCounter::Posts, ToggleOutcome::Added)
        .await
    {
        error!(
            user_id = %post.author,
            post_id = %post.id,
            error = %err,
            "Post was saved but the post count was not, counts need reconciliation"
        );
        return Err(err);
    }

    info!(user_id = %post.author, post_id = %post.id, "Published post");
    Ok(post)
}
