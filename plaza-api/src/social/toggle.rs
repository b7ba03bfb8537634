//! Follow and like toggles.
//!
//! A follow is two writes: the follower's `following` set, then the followed
//! user's `followers` counter. The set write is authoritative. If the counter
//! write cannot be landed afterwards the toggle reports
//! [`InteractionError::Consistency`] and the counter waits for
//! [reconciliation](crate::social::reconcile). A like is a single write, since
//! the like count is derived from the like set.

use crate::social::{InteractionError, UserCounter, retry_on_conflict};
use plaza_common::{
    model::{
        Id,
        post::PostMarker,
        user::{User, UserMarker},
    },
    toggle::{ToggleOutcome, toggle_membership},
};
use plaza_db::store::Store;
use tracing::{error, info};

impl UserCounter {
    fn slot(self, user: &mut User) -> &mut u64 {
        match self {
            UserCounter::Followers => &mut user.followers,
            UserCounter::Posts => &mut user.posts,
        }
    }
}

pub(crate) async fn require_user(
    store: &dyn Store,
    user_id: Id<UserMarker>,
) -> Result<User, InteractionError> {
    store
        .fetch_user(user_id)
        .await?
        .ok_or(InteractionError::UserNotFound(user_id))
}

#[derive(Clone, Copy)]
pub struct ToggleEngine<'a> {
    store: &'a dyn Store,
}

impl<'a> ToggleEngine<'a> {
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Follows `follow_id` if `user_id` does not follow them yet, unfollows
    /// otherwise.
    pub async fn toggle_follow(
        self,
        user_id: Id<UserMarker>,
        follow_id: Id<UserMarker>,
    ) -> Result<ToggleOutcome, InteractionError> {
        if user_id == follow_id {
            return Err(InteractionError::SelfFollow(user_id));
        }

        let store = self.store;
        let (outcome, followed) = retry_on_conflict("follow", move || async move {
            let mut follower = require_user(store, user_id).await?;
            let followed = store
                .fetch_user(follow_id)
                .await?
                .ok_or(InteractionError::FollowedUserNotFound(follow_id))?;

            let outcome = toggle_membership(&mut follower.following, follow_id);
            store.update_user(&follower).await?;
            Ok((outcome, followed))
        })
        .await?;

        if let Err(err) = self
            .adjust_counter(followed, UserCounter::Followers, outcome)
            .await
        {
            error!(
                %user_id,
                %follow_id,
                ?outcome,
                error = %err,
                "Follow was saved but the follower count was not, counts need reconciliation"
            );
            return Err(err);
        }

        info!(%user_id, %follow_id, ?outcome, "Toggled follow");
        Ok(outcome)
    }

    /// Likes `post_id` on behalf of `user_id`, or takes the like back.
    pub async fn toggle_like(
        self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<ToggleOutcome, InteractionError> {
        let store = self.store;
        require_user(store, user_id).await?;

        let outcome = retry_on_conflict("like", move || async move {
            let mut post = store
                .fetch_post(post_id)
                .await?
                .ok_or(InteractionError::PostNotFound(post_id))?;

            let outcome = toggle_membership(&mut post.likes, user_id);
            store.update_post(&post).await?;
            Ok(outcome)
        })
        .await?;

        info!(%user_id, %post_id, ?outcome, "Toggled like");
        Ok(outcome)
    }

    /// Moves `counter` of `user` one step in the direction of `outcome`.
    ///
    /// `user` is the snapshot to write first; on conflicts the user is read
    /// again. Only called once the relationship write has landed, so every
    /// failure is reported as [`InteractionError::Consistency`].
    pub async fn adjust_counter(
        self,
        user: User,
        counter: UserCounter,
        outcome: ToggleOutcome,
    ) -> Result<User, InteractionError> {
        let store = self.store;
        let user_id = user.id;
        let mut snapshot = Some(user);

        retry_on_conflict("counter", || {
            let snapshot = snapshot.take();
            async move {
                let mut user = match snapshot {
                    Some(user) => user,
                    None => store
                        .fetch_user(user_id)
                        .await?
                        .ok_or(InteractionError::UserNotFound(user_id))?,
                };

                let slot = counter.slot(&mut user);
                *slot = outcome.adjust(*slot);
                Ok(store.update_user(&user).await?)
            }
        })
        .await
        .map_err(|err| match err {
            InteractionError::Store(source) => InteractionError::Consistency {
                user: user_id,
                counter,
                source,
            },
            other => other,
        })
    }
}
