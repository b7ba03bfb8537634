//! Fixtures shared by the unit tests: an instrumented in-memory store, a
//! deterministic media store and a router harness.

use crate::{
    config::{Config, StoreBackend},
    media::{MediaError, MediaStore, MediaUpload},
    server::{ServerState, app},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use http_body_util::BodyExt;
use plaza_common::{
    cursor::PostCursor,
    model::{
        Id,
        auth::{AuthToken, AuthTokenHash, Authentication},
        media::{ImageExtension, MediaCategory, MediaKey},
        post::{Post, PostDescription, PostMarker},
        user::{DisplayName, User, UserMarker},
    },
    util::PageSize,
};
use plaza_db::{
    memory::MemoryStore,
    store::{AuthStore, PostStore, Result, Store, StoreError, UserStore},
};
use serde_json::Value;
use std::{
    net::{IpAddr, Ipv4Addr},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use time::{Duration, UtcDateTime, macros::datetime};
use tower::ServiceExt;

/// Accepts every upload and resolves keys to `https://media.test/{bucket}/{key}`.
#[derive(Copy, Clone, Debug, Default)]
pub struct StaticMedia;

#[async_trait]
impl MediaStore for StaticMedia {
    async fn store(&self, _bucket: &str, upload: MediaUpload) -> Result<MediaKey, MediaError> {
        Ok(MediaKey::generate(upload.category, &upload.extension))
    }

    async fn resolve_url(&self, bucket: &str, key: &MediaKey) -> Result<String, MediaError> {
        Ok(format!("https://media.test/{bucket}/{key}"))
    }
}

/// What a [`HookedStore`] does with a user update.
pub enum UserUpdate {
    Proceed,
    /// Lands the given user first, as a concurrent writer would.
    WriteFirst(User),
    /// Fails the update with a conflict.
    Fail,
}

/// What a [`HookedStore`] does with a post update.
pub enum PostUpdate {
    Proceed,
    /// Lands the given post first, as a concurrent writer would.
    WriteFirst(Post),
}

type UserUpdateHook = Box<dyn FnMut(&User) -> UserUpdate + Send>;
type PostUpdateHook = Box<dyn FnMut(&Post) -> PostUpdate + Send>;

/// [`MemoryStore`] that counts every call and can interfere with writes.
#[derive(Default)]
pub struct HookedStore {
    inner: MemoryStore,
    accesses: AtomicUsize,
    user_update_hook: Mutex<Option<UserUpdateHook>>,
    post_update_hook: Mutex<Option<PostUpdateHook>>,
    reject_new_posts: AtomicBool,
}

impl HookedStore {
    pub fn on_user_update(&self, hook: impl FnMut(&User) -> UserUpdate + Send + 'static) {
        *self.user_update_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn on_post_update(&self, hook: impl FnMut(&Post) -> PostUpdate + Send + 'static) {
        *self.post_update_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Makes every following `create_post` fail.
    pub fn reject_new_posts(&self) {
        self.reject_new_posts.store(true, Ordering::SeqCst);
    }

    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    pub fn insert_authentication(&self, authentication: Authentication) {
        self.inner.insert_authentication(authentication);
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for HookedStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        self.touch();
        self.inner.fetch_user(user_id).await
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        self.touch();
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        self.touch();
        let action = self
            .user_update_hook
            .lock()
            .unwrap()
            .as_mut()
            .map_or(UserUpdate::Proceed, |hook| hook(user));

        match action {
            UserUpdate::Proceed => {}
            UserUpdate::WriteFirst(racing) => {
                self.inner.update_user(&racing).await?;
            }
            UserUpdate::Fail => return Err(StoreError::user_conflict(user.id)),
        }
        self.inner.update_user(user).await
    }

    async fn list_user_ids(&self) -> Result<Vec<Id<UserMarker>>> {
        self.touch();
        self.inner.list_user_ids().await
    }

    async fn count_followers(&self, user_id: Id<UserMarker>) -> Result<u64> {
        self.touch();
        self.inner.count_followers(user_id).await
    }
}

#[async_trait]
impl PostStore for HookedStore {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        self.touch();
        self.inner.fetch_post(post_id).await
    }

    async fn create_post(&self, post: &Post) -> Result<()> {
        self.touch();
        if self.reject_new_posts.load(Ordering::SeqCst) {
            return Err(StoreError::post_conflict(post.id));
        }
        self.inner.create_post(post).await
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        self.touch();
        let action = self
            .post_update_hook
            .lock()
            .unwrap()
            .as_mut()
            .map_or(PostUpdate::Proceed, |hook| hook(post));

        if let PostUpdate::WriteFirst(racing) = action {
            self.inner.update_post(&racing).await?;
        }
        self.inner.update_post(post).await
    }

    async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        self.touch();
        self.inner.fetch_user_posts(user_id, after, limit).await
    }

    async fn fetch_posts_by_authors(
        &self,
        authors: &[Id<UserMarker>],
        after: Option<PostCursor>,
        limit: PageSize,
    ) -> Result<Vec<Post>> {
        self.touch();
        self.inner.fetch_posts_by_authors(authors, after, limit).await
    }

    async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        self.touch();
        self.inner.count_user_posts(user_id).await
    }
}

#[async_trait]
impl AuthStore for HookedStore {
    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        self.touch();
        self.inner.fetch_auth(token_hash).await
    }
}

pub async fn seed_user(store: &dyn Store, name: &str) -> User {
    let user = User::new(Id::generate(), DisplayName::new(name).unwrap());
    store.create_user(&user).await.unwrap();
    user
}

fn post_at(author: &User, minutes: i64, image: Option<MediaKey>) -> Post {
    Post::new(
        Id::generate(),
        author.id,
        datetime!(2025-04-01 09:00 UTC) + Duration::minutes(minutes),
        PostDescription::new(format!("post number {minutes}")).unwrap(),
        image,
    )
}

/// A post `minutes` after a fixed instant, stored without touching counters.
pub async fn seed_post(store: &dyn Store, author: &User, minutes: i64) -> Post {
    let post = post_at(author, minutes, None);
    store.create_post(&post).await.unwrap();
    post
}

pub async fn seed_post_with_image(store: &dyn Store, author: &User, minutes: i64) -> Post {
    let extension = ImageExtension::from_file_name("photo.png").unwrap();
    let image = MediaKey::generate(MediaCategory::Post, &extension);
    let post = post_at(author, minutes, Some(image));
    store.create_post(&post).await.unwrap();
    post
}

pub fn test_config() -> Config {
    Config {
        server_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        server_port: 0,
        store_backend: StoreBackend::Memory,
        database_url: None,
        database_max_connections: 1,
        post_bucket: Some("posts".to_owned()),
        avatar_bucket: Some("avatars".to_owned()),
        feed_page_size: PageSize::DEFAULT,
        media_url_expiry_secs: 900,
        reconcile_interval_secs: 0,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Value,
}

/// One part of a `multipart/form-data` body.
pub struct FormPart {
    name: &'static str,
    file_name: Option<&'static str>,
    content: Vec<u8>,
}

impl FormPart {
    pub fn text(name: &'static str, value: &str) -> Self {
        Self {
            name,
            file_name: None,
            content: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &'static str, file_name: &'static str, content: &[u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content: content.to_vec(),
        }
    }

    fn write(&self, body: &mut Vec<u8>, boundary: &str) {
        let headers = match self.file_name {
            Some(file_name) => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.name
            ),
            None => format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                self.name
            ),
        };
        body.extend_from_slice(headers.as_bytes());
        body.extend_from_slice(&self.content);
        body.extend_from_slice(b"\r\n");
    }
}

/// The full router over a [`HookedStore`] and [`StaticMedia`].
pub struct TestApp {
    pub store: Arc<HookedStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let mut config = test_config();
        adjust(&mut config);

        let store = Arc::new(HookedStore::default());
        let state = ServerState {
            store: store.clone(),
            media: Arc::new(StaticMedia),
            config: Arc::new(config),
        };

        Self {
            store,
            router: app(state),
        }
    }

    /// Registers a fresh token for `user_id`, as the identity service would.
    pub fn token_for(&self, user_id: Id<UserMarker>) -> String {
        let token = AuthToken::generate_random(user_id);
        self.store.insert_authentication(Authentication {
            user: user_id,
            token_hash: token.hash().unwrap(),
            created_at: UtcDateTime::now(),
            expires_after: None,
        });
        token.as_token_str()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }

    pub async fn multipart(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        parts: &[FormPart],
    ) -> TestResponse {
        let boundary = "plaza-test-boundary";
        let mut body = Vec::new();
        for part in parts {
            part.write(&mut body, boundary);
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            content_type,
            body,
        }
    }
}
