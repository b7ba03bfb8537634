//! Request extractors that reject with [`ServerError`].

use crate::{config::Config, server::ServerError};
use axum::{
    extract::{FromRef, FromRequestParts, Query as AxumQuery},
    http::request::Parts,
};
use std::sync::Arc;

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// Declares an extractor for a bucket binding. Handlers list it before any
/// extractor that reads the store, so a missing binding fails the request
/// first.
macro_rules! bucket_extractor {
    ($(#[$meta:meta])* $name:ident => $getter:ident) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Debug, Hash)]
        pub struct $name(pub String);

        impl<S> FromRequestParts<S> for $name
        where
            Arc<Config>: FromRef<S>,
            S: Send + Sync,
        {
            type Rejection = ServerError;

            async fn from_request_parts(
                _parts: &mut Parts,
                state: &S,
            ) -> Result<Self, Self::Rejection> {
                let config = Arc::<Config>::from_ref(state);
                Ok(Self(config.$getter()?.to_owned()))
            }
        }
    };
}

bucket_extractor!(
    /// `POST_BUCKET`, needed wherever post images are read or written.
    PostBucket => post_bucket
);

bucket_extractor!(
    /// `AVATAR_BUCKET`, needed by the profile endpoints.
    AvatarBucket => avatar_bucket
);
