use crate::{
    config::Config,
    media::MediaStore,
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::{PostBucket, Query},
        json::Json,
    },
    social::feed::{FeedAggregator, FeedPage},
};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use plaza_common::{
    cursor::PostCursor,
    model::{Id, user::UserMarker},
};
use plaza_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(own_history)
        .typed_get(user_history)
        .typed_get(home_feed)
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct FeedQuery {
    cursor: Option<String>,
}

impl FeedQuery {
    fn cursor(&self) -> Option<PostCursor> {
        PostCursor::decode_optional(self.cursor.as_deref())
    }
}

#[derive(TypedPath)]
#[typed_path("/feed")]
struct OwnHistoryPath;

async fn own_history(
    _: OwnHistoryPath,
    PostBucket(bucket): PostBucket,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
    State(config): State<Arc<Config>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let page = FeedAggregator::new(store.as_ref(), media.as_ref(), &bucket, config.feed_page_size)
        .user_history(user.user_id(), query.cursor())
        .await?;

    Ok(Json(page))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed/users/{id}", rejection(ServerError))]
struct UserHistoryPath {
    id: Id<UserMarker>,
}

async fn user_history(
    UserHistoryPath { id }: UserHistoryPath,
    PostBucket(bucket): PostBucket,
    _: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
    State(config): State<Arc<Config>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let page = FeedAggregator::new(store.as_ref(), media.as_ref(), &bucket, config.feed_page_size)
        .user_history(id, query.cursor())
        .await?;

    Ok(Json(page))
}

#[derive(TypedPath)]
#[typed_path("/feed/home")]
struct HomeFeedPath;

async fn home_feed(
    _: HomeFeedPath,
    PostBucket(bucket): PostBucket,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
    State(config): State<Arc<Config>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>> {
    let page = FeedAggregator::new(store.as_ref(), media.as_ref(), &bucket, config.feed_page_size)
        .home_feed(user.user_id(), query.cursor())
        .await?;

    Ok(Json(page))
}
