//! Object storage for post images and avatars.
//!
//! Stored entities only carry a [`MediaKey`]; readable URLs are minted on
//! every read and expire after the configured lifetime.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, presigning::PresigningConfig, primitives::ByteStream};
use plaza_common::model::media::{ImageExtension, MediaCategory, MediaKey};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Uploading {key} to bucket {bucket} failed: {source}")]
    Upload {
        bucket: String,
        key: MediaKey,
        #[source]
        source: BoxError,
    },
    #[error("Signing a URL for {key} in bucket {bucket} failed: {source}")]
    Sign {
        bucket: String,
        key: MediaKey,
        #[source]
        source: BoxError,
    },
}

/// An uploaded image whose extension has already been checked.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MediaUpload {
    pub category: MediaCategory,
    pub extension: ImageExtension,
    pub content: Vec<u8>,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `upload` under a freshly generated key and returns that key.
    async fn store(&self, bucket: &str, upload: MediaUpload) -> Result<MediaKey, MediaError>;

    /// A time-limited URL for reading `key`. Whether the object exists is not
    /// checked.
    async fn resolve_url(&self, bucket: &str, key: &MediaKey) -> Result<String, MediaError>;
}

#[derive(Clone, Debug)]
pub struct S3MediaStore {
    client: Client,
    url_expiry: Duration,
}

impl S3MediaStore {
    #[must_use]
    pub fn new(client: Client, url_expiry: Duration) -> Self {
        Self { client, url_expiry }
    }

    /// Builds a client from the default AWS credential and region chain.
    pub async fn from_env(url_expiry: Duration) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config), url_expiry)
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn store(&self, bucket: &str, upload: MediaUpload) -> Result<MediaKey, MediaError> {
        let key = MediaKey::generate(upload.category, &upload.extension);
        let size = upload.content.len();

        self.client
            .put_object()
            .bucket(bucket)
            .key(key.get())
            .content_type(upload.extension.content_type())
            .body(ByteStream::from(upload.content))
            .send()
            .await
            .map_err(|err| MediaError::Upload {
                bucket: bucket.to_owned(),
                key: key.clone(),
                source: err.into(),
            })?;

        debug!(bucket, %key, size, "Stored media object");
        Ok(key)
    }

    async fn resolve_url(&self, bucket: &str, key: &MediaKey) -> Result<String, MediaError> {
        let sign_error = |source: BoxError| MediaError::Sign {
            bucket: bucket.to_owned(),
            key: key.clone(),
            source,
        };

        let presigning =
            PresigningConfig::expires_in(self.url_expiry).map_err(|err| sign_error(err.into()))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key.get())
            .presigned(presigning)
            .await
            .map_err(|err| sign_error(err.into()))?;

        Ok(request.uri().to_string())
    }
}
