use crate::{
    config::{Config, MissingConfigError},
    media::{MediaError, MediaStore},
    social::{InteractionError, feed::FeedError},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::{Json, MessageResponse};
use plaza_common::model::{
    Id,
    InvalidTextError,
    auth::{AuthTokenDecodeError, AuthTokenHashError},
    media::UnsupportedImageError,
    post::PostMarker,
    user::UserMarker,
};
use plaza_db::store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod auth;
mod extract;
mod form;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaStore>,
    pub config: Arc<Config>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete service, ready to be served.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Form field {0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidText(#[from] InvalidTextError),
    #[error(transparent)]
    UnsupportedImage(#[from] UnsupportedImageError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was unknown or expired")]
    InvalidToken,
    #[error(transparent)]
    Configuration(#[from] MissingConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("Post with id {0} was not found")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    /// Every failure is either the client's (400) or ours (500); missing
    /// resources and bad credentials count as client errors.
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::MissingField(_)
            | ServerError::InvalidText(_)
            | ServerError::UnsupportedImage(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::Store(StoreError::DuplicateUser(_))
            | ServerError::Interaction(
                InteractionError::SelfFollow(_)
                | InteractionError::UserNotFound(_)
                | InteractionError::FollowedUserNotFound(_)
                | InteractionError::PostNotFound(_),
            )
            | ServerError::Feed(FeedError::UserNotFound(_))
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::Configuration(_)
            | ServerError::Store(_)
            | ServerError::Media(_)
            | ServerError::Interaction(_)
            | ServerError::Feed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text for the response body. Internal details stay in the logs.
    pub fn message(&self) -> String {
        match self {
            ServerError::UnknownRoute(_) => "Route not found.".to_owned(),
            ServerError::PathRejection(_) => "The requested id is not valid.".to_owned(),
            ServerError::QueryRejection(_) => "Invalid query parameters.".to_owned(),
            ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_) => "The request body could not be read.".to_owned(),
            ServerError::MissingField(field) => format!("The field {field} is required."),
            ServerError::InvalidText(err) => format!(
                "{} must have between {} and {} characters.",
                err.kind, err.min, err.max
            ),
            ServerError::UnsupportedImage(_) => {
                "The file must be a png, jpg, jpeg, gif or webp image.".to_owned()
            }
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::UserByIdNotFound(_)
            | ServerError::Feed(FeedError::UserNotFound(_))
            | ServerError::Interaction(InteractionError::UserNotFound(_)) => {
                "User not found.".to_owned()
            }
            ServerError::Interaction(InteractionError::FollowedUserNotFound(_)) => {
                "The user to follow was not found.".to_owned()
            }
            ServerError::Interaction(InteractionError::SelfFollow(_)) => {
                "Users cannot follow themselves.".to_owned()
            }
            ServerError::PostByIdNotFound(_)
            | ServerError::Interaction(InteractionError::PostNotFound(_)) => {
                "Post not found.".to_owned()
            }
            ServerError::Store(StoreError::DuplicateUser(_)) => {
                "This profile already exists.".to_owned()
            }
            ServerError::Configuration(_) => "The service is not fully configured.".to_owned(),
            ServerError::Interaction(InteractionError::Consistency { .. }) => {
                "The change was saved only partially and will be corrected shortly.".to_owned()
            }
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::Store(_)
            | ServerError::Media(_)
            | ServerError::Interaction(_)
            | ServerError::Feed(_) => "Something went wrong, please try again.".to_owned(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Rejecting request");
        }

        (status, Json(MessageResponse::new(self.message()))).into_response()
    }
}
