//! The set-membership flip underneath follow/unfollow and like/unlike.

use serde::Serialize;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    /// Moves a paired counter in the direction of the membership change.
    /// Counters never go below zero.
    #[must_use]
    pub fn adjust(self, counter: u64) -> u64 {
        match self {
            ToggleOutcome::Added => counter.saturating_add(1),
            ToggleOutcome::Removed => counter.saturating_sub(1),
        }
    }
}

/// Removes `target` from `members` if present, otherwise appends it.
///
/// Removal drops every occurrence, so a set that picked up duplicates heals
/// on the next toggle.
pub fn toggle_membership<T: PartialEq>(members: &mut Vec<T>, target: T) -> ToggleOutcome {
    if members.contains(&target) {
        members.retain(|member| *member != target);
        ToggleOutcome::Removed
    } else {
        members.push(target);
        ToggleOutcome::Added
    }
}
