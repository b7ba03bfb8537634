use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Post,
    Avatar,
}

impl MediaCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MediaCategory::Post => "post",
            MediaCategory::Avatar => "avatar",
        }
    }
}

impl Display for MediaCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("File name does not carry an accepted image extension: {0:?}")]
pub struct UnsupportedImageError(pub String);

/// Lowercased extension of an accepted image file, without the dot.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct ImageExtension(&'static str);

impl ImageExtension {
    pub fn from_file_name(file_name: &str) -> Result<Self, UnsupportedImageError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .ok_or_else(|| UnsupportedImageError(file_name.to_owned()))?;

        IMAGE_EXTENSIONS
            .iter()
            .find(|accepted| **accepted == extension)
            .map(|accepted| Self(*accepted))
            .ok_or_else(|| UnsupportedImageError(file_name.to_owned()))
    }

    #[must_use]
    pub fn get(&self) -> &'static str {
        self.0
    }

    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self.0 {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Invalid media key: {0:?}")]
pub struct InvalidMediaKeyError(pub String);

/// Object-store key of an uploaded file, e.g. `post-<uuid>.png`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct MediaKey(String);

impl MediaKey {
    pub fn new(key: String) -> Result<Self, InvalidMediaKeyError> {
        if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Err(InvalidMediaKeyError(key))
        } else {
            Ok(Self(key))
        }
    }

    #[must_use]
    pub fn generate(category: MediaCategory, extension: &ImageExtension) -> Self {
        Self(format!("{category}-{}.{}", Uuid::new_v4(), extension.get()))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for MediaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MediaKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        MediaKey::new(inner).map_err(|err| {
            serde::de::Error::invalid_value(serde::de::Unexpected::Str(&err.0), &"MediaKey")
        })
    }
}
