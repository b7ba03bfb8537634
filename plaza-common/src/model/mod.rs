/// Declares a trimmed, length-checked text newtype.
///
/// The length bounds are counted in characters after trimming surrounding
/// whitespace, and the stored value is the trimmed text.
macro_rules! validated_text {
    ($(#[$meta:meta])* $name:ident: $min:literal ..= $max:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const MIN_LEN: usize = $min;
            pub const MAX_LEN: usize = $max;

            pub fn new(text: impl AsRef<str>) -> Result<Self, $crate::model::InvalidTextError> {
                let trimmed = text.as_ref().trim();
                let len = trimmed.chars().count();

                if (Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
                    Ok(Self(trimmed.to_owned()))
                } else {
                    Err($crate::model::InvalidTextError {
                        kind: stringify!($name),
                        min: Self::MIN_LEN,
                        max: Self::MAX_LEN,
                        len,
                    })
                }
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

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = String::deserialize(deserializer)?;
                $name::new(&inner).map_err(|_| {
                    ::serde::de::Error::invalid_value(
                        ::serde::de::Unexpected::Str(&inner),
                        &stringify!($name),
                    )
                })
            }
        }
    };
}

pub mod auth;
pub mod media;
pub mod post;
pub mod user;

use crate::model::{auth::InvalidAuthTokenHashError, media::InvalidMediaKeyError};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Text(#[from] InvalidTextError),
    #[error(transparent)]
    MediaKey(#[from] InvalidMediaKeyError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error("Counter held a negative value: {0}")]
    NegativeCounter(i64),
    #[error("Token expiry was not positive: {0}s")]
    NonPositiveExpiry(i64),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("{kind} must have between {min} and {max} characters, had {len}")]
pub struct InvalidTextError {
    pub kind: &'static str,
    pub min: usize,
    pub max: usize,
    pub len: usize,
}

/// Typed identifier; `Marker` keeps user and post ids apart.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(Uuid, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }

    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self::new)
    }
}

impl<Marker> From<Uuid> for Id<Marker> {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for Uuid {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

/// Revision of a stored entity, bumped on every successful write.
///
/// Writes are conditional on the revision that was read.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub fn new(version: i64) -> Self {
        Self(version)
    }

    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

pub fn counter_from_i64(value: i64) -> Result<u64, ModelValidationError> {
    u64::try_from(value).map_err(|_| ModelValidationError::NegativeCounter(value))
}
