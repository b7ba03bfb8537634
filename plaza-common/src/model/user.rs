use crate::model::{Id, Version, media::MediaKey};
use serde::Deserialize;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

validated_text!(
    /// Name shown on a profile and copied into every comment the user writes.
    DisplayName: 2..=50
);

/// A user profile together with its side of the follow graph.
///
/// `following` is the authoritative edge set. `followers` and `posts` are
/// denormalized counters kept in step by the toggle engine and repaired by
/// reconciliation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: DisplayName,
    pub avatar: Option<MediaKey>,
    pub following: Vec<Id<UserMarker>>,
    pub followers: u64,
    pub posts: u64,
    pub version: Version,
}

impl User {
    #[must_use]
    pub fn new(id: Id<UserMarker>, name: DisplayName) -> Self {
        Self {
            id,
            name,
            avatar: None,
            following: Vec::new(),
            followers: 0,
            posts: 0,
            version: Version::INITIAL,
        }
    }

    #[must_use]
    pub fn follows(&self, user_id: Id<UserMarker>) -> bool {
        self.following.contains(&user_id)
    }

    /// The owners whose posts make up this user's home feed: everyone followed
    /// plus the user themself, without duplicates.
    #[must_use]
    pub fn feed_authors(&self) -> Vec<Id<UserMarker>> {
        let mut authors = Vec::with_capacity(self.following.len() + 1);
        for id in self.following.iter().copied().chain([self.id]) {
            if !authors.contains(&id) {
                authors.push(id);
            }
        }
        authors
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateUser {
    pub name: DisplayName,
}
