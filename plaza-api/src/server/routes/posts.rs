use crate::{
    media::MediaStore,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::PostBucket,
        form::UploadForm,
        json::{Json, MessageResponse, message},
    },
    social::{
        InteractionError,
        interactions::{append_comment, publish_post},
        toggle::ToggleEngine,
        views::PostView,
    },
};
use axum::{
    Router,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::{
    model::{
        Id,
        media::MediaCategory,
        post::{CreateComment, Post, PostDescription, PostMarker},
    },
    toggle::ToggleOutcome,
};
use plaza_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::warn;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_post(toggle_like)
        .typed_post(add_comment)
}

/// The current time at the precision the store keeps.
fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000))
}

#[derive(TypedPath)]
#[typed_path("/posts")]
struct PostsPath;

async fn create_post(
    _: PostsPath,
    PostBucket(bucket): PostBucket,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>> {
    let form = UploadForm::read(multipart, &["description"]).await?;
    let description = PostDescription::new(
        form.text("description")
            .ok_or(ServerError::MissingField("description"))?,
    )?;
    let image = form.image(MediaCategory::Post)?;

    let author = user.user_id();
    if store.fetch_user(author).await?.is_none() {
        return Err(ServerError::UserByIdNotFound(author));
    }

    let image = match image {
        Some(upload) => Some(media.store(&bucket, upload).await?),
        None => None,
    };
    let post = Post::new(Id::generate(), author, now(), description, image);
    let uploaded = post.image.clone();
    if let Err(err) = publish_post(store.as_ref(), post).await {
        // A consistency error means the post, and with it the image, was kept.
        if let Some(key) = uploaded
            && !matches!(err, InteractionError::Consistency { .. })
        {
            warn!(%bucket, %key, "Post was not saved after the image upload, object is orphaned");
        }
        return Err(err.into());
    }

    Ok(message("Post created."))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    PostBucket(bucket): PostBucket,
    _: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
) -> Result<Json<PostView>> {
    let post = store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(PostView::resolve(post, media.as_ref(), &bucket).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePath {
    id: Id<PostMarker>,
}

async fn toggle_like(
    LikePath { id }: LikePath,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<MessageResponse>> {
    let outcome = ToggleEngine::new(store.as_ref())
        .toggle_like(user.user_id(), id)
        .await?;

    Ok(message(match outcome {
        ToggleOutcome::Added => "Post liked.",
        ToggleOutcome::Removed => "Post unliked.",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    CommentsPath { id }: CommentsPath,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    Json(CreateComment { comment }): Json<CreateComment>,
) -> Result<Json<MessageResponse>> {
    append_comment(store.as_ref(), id, user.user_id(), comment, now()).await?;

    Ok(message("Comment added."))
}
