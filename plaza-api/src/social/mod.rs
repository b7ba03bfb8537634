//! The consistency layer between handlers and the store: toggles with their
//! paired counters, profile and comment writes, feed assembly and counter
//! reconciliation.

use plaza_common::model::{Id, post::PostMarker, user::UserMarker};
use plaza_db::store::StoreError;
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

pub mod feed;
pub mod interactions;
pub mod reconcile;
pub mod toggle;
pub mod views;

/// Attempts per conditional write before a conflict is reported as an error.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Counters stored on a user next to the relationship they summarize.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum UserCounter {
    Followers,
    Posts,
}

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("User {0} tried to follow themself")]
    SelfFollow(Id<UserMarker>),
    #[error("User with id {0} was not found")]
    UserNotFound(Id<UserMarker>),
    #[error("Followed user with id {0} was not found")]
    FollowedUserNotFound(Id<UserMarker>),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The authoritative write landed but its paired counter did not.
    #[error("{counter:?} counter of user {user} was not adjusted: {source}")]
    Consistency {
        user: Id<UserMarker>,
        counter: UserCounter,
        #[source]
        source: StoreError,
    },
}

impl InteractionError {
    fn is_conflict(&self) -> bool {
        matches!(self, InteractionError::Store(err) if err.is_conflict())
    }
}

/// Runs `attempt` again while it fails with a write conflict, up to
/// [`MAX_WRITE_ATTEMPTS`] times in total. Each attempt must re-read what it
/// writes.
pub(crate) async fn retry_on_conflict<T, Fut>(
    operation: impl Display,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T, InteractionError>
where
    Fut: Future<Output = Result<T, InteractionError>>,
{
    let mut tries = 1;
    loop {
        match attempt().await {
            Err(err) if err.is_conflict() && tries < MAX_WRITE_ATTEMPTS => {
                debug!(%operation, tries, error = %err, "Write conflicted, retrying");
                tries += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::social::{InteractionError, MAX_WRITE_ATTEMPTS, retry_on_conflict};
    use plaza_common::model::Id;
    use plaza_db::store::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let result = retry_on_conflict("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::user_conflict(Id::generate()).into())
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_conflicts_give_up() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::user_conflict(Id::generate()).into())
        })
        .await;

        assert!(matches!(result, Err(InteractionError::Store(StoreError::Conflict { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_WRITE_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_on_conflict("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(InteractionError::UserNotFound(Id::generate()))
        })
        .await;

        assert!(matches!(result, Err(InteractionError::UserNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
