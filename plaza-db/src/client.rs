use crate::{
    record::{AuthenticationRecord, PostRecord, UserRecord},
    store::{AuthStore, PostStore, Result, StoreError, UserStore},
};
use async_trait::async_trait;
use plaza_common::{
    cursor::PostCursor,
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        counter_from_i64,
        post::{Post, PostMarker},
        user::{User, UserMarker},
    },
    util::PageSize,
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "user_id, name, avatar, following, followers, posts, version";
const POST_COLUMNS: &str = "post_id, user_id, date, description, image, likes, comments, version";

/// Postgres-backed store. Users, posts and authentications live in the
/// `users`, `posts` and `auth` schemas created by the bundled migrations.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn uuids<Marker>(ids: &[Id<Marker>]) -> Vec<Uuid> {
    ids.iter().map(|id| id.uuid()).collect()
}

fn cursor_bounds(after: Option<PostCursor>) -> (Option<OffsetDateTime>, Option<Uuid>) {
    after.map_or((None, None), |cursor| {
        (Some(cursor.date), Some(cursor.post_id.uuid()))
    })
}

#[async_trait]
impl UserStore for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users.users WHERE user_id = $1"
        ))
        .bind(user_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let inserted = query(
            "
            INSERT INTO users.users (user_id, name, avatar, following, followers, posts, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO NOTHING
            ",
        )
        .bind(user.id.uuid())
        .bind(user.name.get())
        .bind(user.avatar.as_ref().map(|avatar| avatar.get()))
        .bind(uuids(&user.following))
        .bind(user.followers.cast_signed())
        .bind(user.posts.cast_signed())
        .bind(user.version.get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(StoreError::DuplicateUser(user.id));
        }
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let record = query_as::<_, UserRecord>(&format!(
            "
            UPDATE users.users
            SET name = $2, avatar = $3, following = $4, followers = $5, posts = $6,
                version = version + 1
            WHERE user_id = $1 AND version = $7
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.id.uuid())
        .bind(user.name.get())
        .bind(user.avatar.as_ref().map(|avatar| avatar.get()))
        .bind(uuids(&user.following))
        .bind(user.followers.cast_signed())
        .bind(user.posts.cast_signed())
        .bind(user.version.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::user_conflict(user.id))?;

        Ok(User::try_from(record)?)
    }

    async fn list_user_ids(&self) -> Result<Vec<Id<UserMarker>>> {
        let ids = query_scalar::<_, Uuid>("SELECT user_id FROM users.users ORDER BY user_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(Id::from).collect())
    }

    async fn count_followers(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users.users WHERE following @> ARRAY[$1]::uuid[]",
        )
        .bind(user_id.uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(counter_from_i64(count)?)
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts.posts WHERE post_id = $1"
        ))
        .bind(post_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        query(
            "
            INSERT INTO posts.posts
                (post_id, user_id, date, description, image, likes, comments, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(post.id.uuid())
        .bind(post.author.uuid())
        .bind(post.date)
        .bind(post.description.get())
        .bind(post.image.as_ref().map(|image| image.get()))
        .bind(uuids(&post.likes))
        .bind(Json(&post.comments))
        .bind(post.version.get())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            UPDATE posts.posts
            SET description = $2, image = $3, likes = $4, comments = $5, version = version + 1
            WHERE post_id = $1 AND version = $6
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(post.id.uuid())
        .bind(post.description.get())
        .bind(post.image.as_ref().map(|image| image.get()))
        .bind(uuids(&post.likes))
        .bind(Json(&post.comments))
        .bind(post.version.get())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::post_conflict(post.id))?;

        Ok(Post::try_from(record)?)
    }

    async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        let (after_date, after_id) = cursor_bounds(after);
        let records = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE user_id = $1
                AND ($2::timestamptz IS NULL OR (date, post_id) < ($2::timestamptz, $3::uuid))
            ORDER BY date DESC, post_id DESC
            LIMIT $4
            "
        ))
        .bind(user_id.uuid())
        .bind(after_date)
        .bind(after_id)
        .bind(i64::from(limit.get()))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        let (after_date, after_id) = cursor_bounds(after);
        let records = query_as::<_, PostRecord>(&format!(
            "
            SELECT {POST_COLUMNS}
            FROM posts.posts
            WHERE user_id = ANY($1)
                AND ($2::timestamptz IS NULL OR (date, post_id) < ($2::timestamptz, $3::uuid))
            ORDER BY date DESC, post_id DESC
            LIMIT $4
            "
        ))
        .bind(uuids(authors))
        .bind(after_date)
        .bind(after_id)
        .bind(i64::from(limit.get()))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts.posts WHERE user_id = $1")
            .bind(user_id.uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(counter_from_i64(count)?)
    }
}

#[async_trait]
impl AuthStore for DbClient {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT user_id, token_hash, created_at, expires_after_seconds
            FROM auth.authentications
            WHERE token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }
}
