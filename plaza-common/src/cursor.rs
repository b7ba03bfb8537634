//! Continuation tokens for feed pagination.
//!
//! A token names the last post of the previous page. It travels as a URL-safe
//! base64 string wrapping `id=..&userId=..&date=..`, with the date as unix
//! nanoseconds. Decoding is deliberately lenient: a token that is unreadable
//! or lacks any of the three fields decodes to `None`, which callers treat as
//! "start from the first page".

use crate::model::{Id, post::PostMarker, user::UserMarker};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::cmp::Ordering;
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostCursor {
    pub post_id: Id<PostMarker>,
    pub user_id: Id<UserMarker>,
    pub date: OffsetDateTime,
}

impl PostCursor {
    #[must_use]
    pub fn encode(&self) -> String {
        let fields = format!(
            "id={}&userId={}&date={}",
            self.post_id,
            self.user_id,
            self.date.unix_timestamp_nanos()
        );
        BASE64_URL_SAFE_NO_PAD.encode(fields)
    }

    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        let fields = String::from_utf8(bytes).ok()?;

        let mut post_id = None;
        let mut user_id = None;
        let mut date = None;

        for (key, value) in fields.split('&').filter_map(|pair| pair.split_once('=')) {
            match key {
                "id" => post_id = value.parse().ok(),
                "userId" => user_id = value.parse().ok(),
                "date" => {
                    date = value
                        .parse::<i128>()
                        .ok()
                        .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok());
                }
                _ => {}
            }
        }

        Some(Self {
            post_id: post_id?,
            user_id: user_id?,
            date: date?,
        })
    }

    /// Decodes an optional query value, see [`PostCursor::decode`].
    #[must_use]
    pub fn decode_optional(token: Option<&str>) -> Option<Self> {
        token.and_then(Self::decode)
    }

    #[must_use]
    pub fn sort_key(&self) -> (OffsetDateTime, Id<PostMarker>) {
        (self.date, self.post_id)
    }

    /// Whether a post with `sort_key` comes after this cursor in newest-first
    /// order.
    #[must_use]
    pub fn admits(&self, sort_key: (OffsetDateTime, Id<PostMarker>)) -> bool {
        sort_key.cmp(&self.sort_key()) == Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use crate::{cursor::PostCursor, model::Id};
    use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
    use time::{Duration, macros::datetime};

    fn cursor() -> PostCursor {
        PostCursor {
            post_id: Id::generate(),
            user_id: Id::generate(),
            date: datetime!(2025-06-01 08:30:15.123456 UTC),
        }
    }

    #[test]
    fn encoded_cursor_decodes_to_same_position() {
        let cursor = cursor();
        let token = cursor.encode();

        assert!(!token.contains(['+', '/', '=', '&']));
        assert_eq!(PostCursor::decode(&token), Some(cursor));
    }

    #[test]
    fn partial_cursor_is_absent() {
        let cursor = cursor();
        let without_date = BASE64_URL_SAFE_NO_PAD
            .encode(format!("id={}&userId={}", cursor.post_id, cursor.user_id));
        let without_user = BASE64_URL_SAFE_NO_PAD.encode(format!(
            "id={}&date={}",
            cursor.post_id,
            cursor.date.unix_timestamp_nanos()
        ));
        let bad_id = BASE64_URL_SAFE_NO_PAD.encode(format!(
            "id=x&userId={}&date={}",
            cursor.user_id,
            cursor.date.unix_timestamp_nanos()
        ));

        assert_eq!(PostCursor::decode(&without_date), None);
        assert_eq!(PostCursor::decode(&without_user), None);
        assert_eq!(PostCursor::decode(&bad_id), None);
        assert_eq!(PostCursor::decode("%%%"), None);
        assert_eq!(PostCursor::decode(""), None);
        assert_eq!(PostCursor::decode_optional(None), None);
    }

    #[test]
    fn admits_only_older_posts() {
        let cursor = cursor();

        assert!(!cursor.admits(cursor.sort_key()));
        assert!(cursor.admits((cursor.date - Duration::seconds(1), Id::generate())));
        assert!(!cursor.admits((cursor.date + Duration::seconds(1), Id::generate())));

        let smaller_id = Id::new(uuid::Uuid::nil());
        assert!(cursor.admits((cursor.date, smaller_id)));
    }
}
