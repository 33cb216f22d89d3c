pub mod auth;
pub mod comment;
pub mod follow;
pub mod group;
pub mod media;
pub mod post;
pub mod user;

use crate::{
    model::{
        auth::InvalidAuthTokenHashError,
        group::{InvalidGroupSlugError, InvalidGroupTitleError},
        media::InvalidMediaPathError,
        user::InvalidUserHandleError,
    },
    util::NonPositiveDurationError,
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::{OffsetDateTime, error::ComponentRange};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    GroupSlug(#[from] InvalidGroupSlugError),
    #[error(transparent)]
    GroupTitle(#[from] InvalidGroupTitleError),
    #[error(transparent)]
    MediaPath(#[from] InvalidMediaPathError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error("Timestamp out of range: {0}")]
    Timestamp(#[from] ComponentRange),
}

/// Row id of a record, tagged with the kind of record it points to.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(i64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<i64> for Id<Marker> {
    fn from(value: i64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for i64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        i64::from_str(s).map(Id::new)
    }
}

/// Timestamps are stored as whole milliseconds since the unix epoch.
#[must_use]
pub fn timestamp_millis(time: OffsetDateTime) -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (time.unix_timestamp_nanos() / 1_000_000) as i64;
    millis
}

pub fn from_timestamp_millis(millis: i64) -> Result<OffsetDateTime, ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
}

/// Display helper that cuts text down to at most `len` characters.
pub(crate) fn truncated(text: &str, len: usize) -> &str {
    match text.char_indices().nth(len) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{from_timestamp_millis, timestamp_millis, truncated};
    use time::macros::datetime;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncated("Тестовый пост номер один", 15), "Тестовый пост н");
        assert_eq!(truncated("short", 15), "short");
        assert_eq!(truncated("", 15), "");
    }

    #[test]
    fn timestamp_keeps_milliseconds() {
        let time = datetime!(2025-10-24 10:30:15.123 UTC);
        let millis = timestamp_millis(time);
        assert_eq!(from_timestamp_millis(millis).unwrap(), time);

        let precise = datetime!(2025-10-24 10:30:15.123456 UTC);
        assert_eq!(from_timestamp_millis(timestamp_millis(precise)).unwrap(), time);
    }
}
