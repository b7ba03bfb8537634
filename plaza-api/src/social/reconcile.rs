//! Repairs denormalized counters from the relationships they summarize.
//!
//! Counter writes that failed after their relationship write leave a user's
//! `followers` or `posts` off by some amount. The reconciler recounts both
//! from the follow graph and the post table and writes back any difference.

use crate::social::{InteractionError, retry_on_conflict};
use plaza_common::model::{Id, user::UserMarker};
use plaza_db::store::Store;
use std::{sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy)]
pub struct Reconciler<'a> {
    store: &'a dyn Store,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Recounts one user; returns whether anything had to be corrected.
    pub async fn reconcile_user(self, user_id: Id<UserMarker>) -> Result<bool, InteractionError> {
        let store = self.store;

        retry_on_conflict("reconcile", move || async move {
            let Some(mut user) = store.fetch_user(user_id).await? else {
                return Ok(false);
            };
            let followers = store.count_followers(user_id).await?;
            let posts = store.count_user_posts(user_id).await?;

            if user.followers == followers && user.posts == posts {
                return Ok(false);
            }

            warn!(
                %user_id,
                stored_followers = user.followers,
                followers,
                stored_posts = user.posts,
                posts,
                "Correcting drifted counters"
            );
            user.followers = followers;
            user.posts = posts;
            store.update_user(&user).await?;
            Ok(true)
        })
        .await
    }

    /// Recounts every user; returns how many were corrected.
    ///
    /// A user that cannot be reconciled is logged and skipped.
    pub async fn reconcile_all(self) -> Result<usize, InteractionError> {
        let mut corrected = 0;
        for user_id in self.store.list_user_ids().await? {
            match self.reconcile_user(user_id).await {
                Ok(true) => corrected += 1,
                Ok(false) => {}
                Err(err) => error!(%user_id, error = %err, "Could not reconcile user counters"),
            }
        }
        Ok(corrected)
    }
}

/// Reconciles all users every `interval` until `shutdown` is cancelled.
pub async fn run_periodically(
    store: Arc<dyn Store>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let reconciler = Reconciler::new(store.as_ref());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; counts are repaired at startup too.

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => match reconciler.reconcile_all().await {
                Ok(corrected) => info!(corrected, "Reconciled counters"),
                Err(err) => error!(error = %err, "Counter reconciliation failed"),
            },
        }
    }

    debug!("Stopped counter reconciliation");
}
