use plaza_common::util::PageSize;
use serde::Deserialize;
use std::{net::IpAddr, time::Duration};
use thiserror::Error;

/// Where profiles, posts and authentications are kept.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

/// Process configuration, read once from the environment at startup.
///
/// Bucket bindings are optional here so the server can start without them.
/// Endpoints that need one ask for it through [`Config::post_bucket`] or
/// [`Config::avatar_bucket`] and fail before touching any store.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Config {
    pub server_address: IpAddr,
    pub server_port: u16,
    #[serde(default)]
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    pub post_bucket: Option<String>,
    pub avatar_bucket: Option<String>,
    #[serde(default)]
    pub feed_page_size: PageSize,
    #[serde(default = "default_media_url_expiry_secs")]
    pub media_url_expiry_secs: u64,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_media_url_expiry_secs() -> u64 {
    900
}

fn default_reconcile_interval_secs() -> u64 {
    3600
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
#[error("Required configuration {0} is not set")]
pub struct MissingConfigError(pub &'static str);

fn required<'a>(value: Option<&'a str>, name: &'static str) -> Result<&'a str, MissingConfigError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(MissingConfigError(name))
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn post_bucket(&self) -> Result<&str, MissingConfigError> {
        required(self.post_bucket.as_deref(), "POST_BUCKET")
    }

    pub fn avatar_bucket(&self) -> Result<&str, MissingConfigError> {
        required(self.avatar_bucket.as_deref(), "AVATAR_BUCKET")
    }

    pub fn database_url(&self) -> Result<&str, MissingConfigError> {
        required(self.database_url.as_deref(), "DATABASE_URL")
    }

    /// Bucket bindings that are unset, for the startup warning.
    #[must_use]
    pub fn missing_buckets(&self) -> Vec<&'static str> {
        [self.post_bucket().err(), self.avatar_bucket().err()]
            .into_iter()
            .flatten()
            .map(|MissingConfigError(name)| name)
            .collect()
    }

    #[must_use]
    pub fn media_url_expiry(&self) -> Duration {
        Duration::from_secs(self.media_url_expiry_secs)
    }

    /// `None` when periodic reconciliation is switched off.
    #[must_use]
    pub fn reconcile_interval(&self) -> Option<Duration> {
        (self.reconcile_interval_secs > 0).then(|| Duration::from_secs(self.reconcile_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, MissingConfigError, StoreBackend};
    use plaza_common::util::PageSize;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "8080")]);

        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.feed_page_size, PageSize::DEFAULT);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.media_url_expiry_secs, 900);
        assert!(config.reconcile_interval().is_some());
        assert_eq!(config.missing_buckets(), ["POST_BUCKET", "AVATAR_BUCKET"]);
    }

    #[test]
    fn blank_buckets_count_as_missing() {
        let config = config_from(&[
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("STORE_BACKEND", "memory"),
            ("POST_BUCKET", "  "),
            ("AVATAR_BUCKET", "avatars"),
            ("FEED_PAGE_SIZE", "12"),
            ("RECONCILE_INTERVAL_SECS", "0"),
        ]);

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.post_bucket(), Err(MissingConfigError("POST_BUCKET")));
        assert_eq!(config.avatar_bucket(), Ok("avatars"));
        assert_eq!(config.feed_page_size.get(), 12);
        assert_eq!(config.reconcile_interval(), None);
    }

    #[test]
    fn page_size_must_be_positive() {
        let vars = [
            ("SERVER_ADDRESS", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("FEED_PAGE_SIZE", "0"),
        ];
        let result = envy::from_iter::<_, Config>(
            vars.iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned())),
        );

        assert!(result.is_err());
    }
}
