use crate::{
    media::{MediaStore, MediaUpload},
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::AvatarBucket,
        form::UploadForm,
        json::{Json, MessageResponse, message},
    },
    social::{
        interactions::update_profile, toggle::ToggleEngine, views::UserView,
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
        user::{CreateUser, DisplayName, User, UserMarker},
    },
    toggle::ToggleOutcome,
};
use plaza_db::store::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_post(create_profile)
        .typed_get(get_own_profile)
        .typed_put(update_own_profile)
        .typed_get(get_profile)
        .typed_post(toggle_follow)
}

#[derive(TypedPath)]
#[typed_path("/users")]
struct UsersPath;

async fn create_profile(
    _: UsersPath,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    Json(CreateUser { name }): Json<CreateUser>,
) -> Result<Json<MessageResponse>> {
    store.create_user(&User::new(user.user_id(), name)).await?;

    Ok(message("Profile created."))
}

#[derive(TypedPath)]
#[typed_path("/users/me")]
struct OwnProfilePath;

async fn get_own_profile(
    _: OwnProfilePath,
    AvatarBucket(bucket): AvatarBucket,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
) -> Result<Json<UserView>> {
    let id = user.user_id();
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(UserView::resolve(user, media.as_ref(), &bucket).await?))
}

async fn update_own_profile(
    _: OwnProfilePath,
    AvatarBucket(bucket): AvatarBucket,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<MessageResponse>> {
    let form = UploadForm::read(multipart, &["name"]).await?;
    let name = form.text("name").map(DisplayName::new).transpose()?;
    let avatar: Option<MediaUpload> = form.image(MediaCategory::Avatar)?;

    if name.is_none() && avatar.is_none() {
        return Err(ServerError::MissingField("name"));
    }

    let avatar = match avatar {
        Some(upload) => Some(media.store(&bucket, upload).await?),
        None => None,
    };
    let uploaded = avatar.clone();
    if let Err(err) = update_profile(store.as_ref(), user.user_id(), name, avatar).await {
        if let Some(key) = uploaded {
            warn!(%bucket, %key, "Profile update failed after the avatar upload, object is orphaned");
        }
        return Err(err.into());
    }

    Ok(message("Profile updated."))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct ProfilePath {
    id: Id<UserMarker>,
}

async fn get_profile(
    ProfilePath { id }: ProfilePath,
    AvatarBucket(bucket): AvatarBucket,
    _: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
    State(media): State<Arc<dyn MediaStore>>,
) -> Result<Json<UserView>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(UserView::resolve(user, media.as_ref(), &bucket).await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/follow", rejection(ServerError))]
struct FollowPath {
    id: Id<UserMarker>,
}

async fn toggle_follow(
    FollowPath { id }: FollowPath,
    user: AuthenticatedUser,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<MessageResponse>> {
    let outcome = ToggleEngine::new(store.as_ref())
        .toggle_follow(user.user_id(), id)
        .await?;

    Ok(message(match outcome {
        ToggleOutcome::Added => "User followed.",
        ToggleOutcome::Removed => "User unfollowed.",
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_util::{FormPart, TestApp, UserUpdate, seed_user};
    use axum::http::{Method, StatusCode};
    use plaza_db::store::UserStore;
    use serde_json::json;

    #[tokio::test]
    async fn profile_is_created_once() {
        let app = TestApp::new();
        let token = app.token_for(plaza_common::model::Id::generate());

        let created = app
            .request(Method::POST, "/users", Some(&token), Some(json!({ "name": "ana" })))
            .await;
        assert_eq!(created.status, StatusCode::OK);
        assert_eq!(created.body, json!({ "msg": "Profile created." }));

        let again = app
            .request(Method::POST, "/users", Some(&token), Some(json!({ "name": "ana" })))
            .await;
        assert_eq!(again.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn short_names_are_rejected() {
        let app = TestApp::new();
        let token = app.token_for(plaza_common::model::Id::generate());

        let response = app
            .request(Method::POST, "/users", Some(&token), Some(json!({ "name": " a " })))
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn own_profile_shows_counts() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let token = app.token_for(ana.id);

        let response = app.request(Method::GET, "/users/me", Some(&token), None).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(
            response.body,
            json!({
                "id": ana.id,
                "name": "ana",
                "following": [],
                "followers": 0,
                "posts": 0,
            })
        );
    }

    #[tokio::test]
    async fn avatar_upload_sets_the_profile_picture() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let token = app.token_for(ana.id);

        let response = app
            .multipart(
                Method::PUT,
                "/users/me",
                &token,
                &[FormPart::file("file", "me.png", b"png bytes")],
            )
            .await;

        assert_eq!(response.status, StatusCode::OK);
        let profile = app.request(Method::GET, "/users/me", Some(&token), None).await;
        let avatar = profile.body["avatar"].as_str().unwrap();
        assert!(avatar.starts_with("https://media.test/avatars/avatar-"), "{avatar}");
    }

    #[tokio::test]
    async fn failed_profile_write_after_upload_is_a_server_error() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let token = app.token_for(ana.id);
        app.store.on_user_update(|_| UserUpdate::Fail);

        let response = app
            .multipart(
                Method::PUT,
                "/users/me",
                &token,
                &[FormPart::file("file", "me.png", b"png bytes")],
            )
            .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.body,
            json!({ "msg": "Something went wrong, please try again." })
        );
        assert_eq!(app.store.fetch_user(ana.id).await.unwrap().unwrap().avatar, None);
    }

    #[tokio::test]
    async fn follow_toggles_over_http() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let bob = seed_user(app.store.as_ref(), "bob").await;
        let token = app.token_for(ana.id);
        let uri = format!("/users/{}/follow", bob.id);

        let followed = app.request(Method::POST, &uri, Some(&token), None).await;
        assert_eq!(followed.body, json!({ "msg": "User followed." }));
        assert_eq!(app.store.fetch_user(bob.id).await.unwrap().unwrap().followers, 1);

        let unfollowed = app.request(Method::POST, &uri, Some(&token), None).await;
        assert_eq!(unfollowed.body, json!({ "msg": "User unfollowed." }));
        assert_eq!(app.store.fetch_user(bob.id).await.unwrap().unwrap().followers, 0);
    }

    #[tokio::test]
    async fn self_follow_is_a_client_error() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let token = app.token_for(ana.id);

        let response = app
            .request(Method::POST, &format!("/users/{}/follow", ana.id), Some(&token), None)
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, json!({ "msg": "Users cannot follow themselves." }));
        assert_eq!(app.store.fetch_user(ana.id).await.unwrap().unwrap(), ana);
    }

    #[tokio::test]
    async fn missing_avatar_bucket_fails_before_the_store() {
        let app = TestApp::with_config(|config| config.avatar_bucket = None);
        let ana = seed_user(app.store.as_ref(), "ana").await;
        let token = app.token_for(ana.id);
        let before = app.store.accesses();

        let response = app
            .request(Method::GET, &format!("/users/{}", ana.id), Some(&token), None)
            .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.store.accesses(), before);
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let app = TestApp::new();
        let ana = seed_user(app.store.as_ref(), "ana").await;

        let response = app
            .request(Method::GET, &format!("/users/{}", ana.id), None, None)
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body, json!({ "msg": "User not found." }));
    }
}
