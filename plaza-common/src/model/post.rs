use crate::{
    cursor::PostCursor,
    model::{
        Id, Version,
        media::MediaKey,
        user::{DisplayName, UserMarker},
    },
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

validated_text!(PostDescription: 5..=2200);

validated_text!(CommentText: 2..=1000);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub date: OffsetDateTime,
    pub description: PostDescription,
    pub image: Option<MediaKey>,
    /// Authoritative like set; its length is the like count.
    pub likes: Vec<Id<UserMarker>>,
    /// Append-only, in display order.
    pub comments: Vec<Comment>,
    pub version: Version,
}

impl Post {
    #[must_use]
    pub fn new(
        id: Id<PostMarker>,
        author: Id<UserMarker>,
        date: OffsetDateTime,
        description: PostDescription,
        image: Option<MediaKey>,
    ) -> Self {
        Self {
            id,
            author,
            date,
            description,
            image,
            likes: Vec::new(),
            comments: Vec::new(),
            version: Version::INITIAL,
        }
    }

    #[must_use]
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    /// Feed order key; feeds list posts by this key descending.
    #[must_use]
    pub fn sort_key(&self) -> (OffsetDateTime, Id<PostMarker>) {
        (self.date, self.id)
    }

    #[must_use]
    pub fn cursor(&self) -> PostCursor {
        PostCursor {
            post_id: self.id,
            user_id: self.author,
            date: self.date,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_id: Id<UserMarker>,
    pub user_name: DisplayName,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub comment: CommentText,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct CreateComment {
    pub comment: CommentText,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        post::{Comment, CommentText, PostDescription},
        user::DisplayName,
    };
    use time::macros::datetime;

    #[test]
    fn text_bounds() {
        assert!(PostDescription::new("  hey  ").is_err());
        assert!(PostDescription::new("hello").is_ok());
        assert!(CommentText::new(" a ").is_err());
        assert_eq!(CommentText::new(" ok ").unwrap().get(), "ok");
    }

    #[test]
    fn comment_json_shape() {
        let comment = Comment {
            user_id: "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap(),
            user_name: DisplayName::new("ana").unwrap(),
            date: datetime!(2025-03-01 12:00 UTC),
            comment: CommentText::new("nice!").unwrap(),
        };

        let json = serde_json::to_value(&comment).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": "67e55044-10b1-426f-9247-bb680e5fe0c8",
                "userName": "ana",
                "date": "2025-03-01T12:00:00Z",
                "comment": "nice!",
            })
        );
        assert_eq!(serde_json::from_value::<Comment>(json).unwrap(), comment);
    }
}
