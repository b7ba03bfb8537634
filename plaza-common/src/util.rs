use serde::{
    Deserialize, Deserializer,
    de::{Error, Unexpected},
};
use std::num::NonZeroU32;
use thiserror::Error;

/// Number of posts per feed page, shared by every feed mode.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Hash)]
pub struct PageSize(NonZeroU32);

impl PageSize {
    pub const MAX: u32 = 100;
    pub const DEFAULT: Self = Self(NonZeroU32::new(5).unwrap());

    #[must_use]
    pub fn new(size: u32) -> Option<Self> {
        NonZeroU32::new(size)
            .filter(|size| size.get() <= Self::MAX)
            .map(Self)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }

    #[must_use]
    pub fn as_usize(self) -> usize {
        self.get() as usize
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Page size must be between 1 and {max}: {0}", max = PageSize::MAX)]
pub struct InvalidPageSizeError(u32);

impl TryFrom<u32> for PageSize {
    type Error = InvalidPageSizeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidPageSizeError(value))
    }
}

impl<'de> Deserialize<'de> for PageSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u32::deserialize(deserializer)?;
        Self::new(inner)
            .ok_or_else(|| Error::invalid_value(Unexpected::Unsigned(inner.into()), &"PageSize"))
    }
}
