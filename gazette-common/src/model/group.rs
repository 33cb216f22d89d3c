use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_SLUG_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

/// A community posts can be published in.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: GroupTitle,
    pub slug: GroupSlug,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CreateGroup {
    pub title: GroupTitle,
    pub slug: GroupSlug,
    pub description: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupTitle(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group title is invalid: {0}")]
pub struct InvalidGroupTitleError(String);

/// URL-safe group identifier made of ASCII letters, digits, `-` and `_`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group slug is invalid: {0}")]
pub struct InvalidGroupSlugError(String);

impl GroupTitle {
    pub fn new(title: String) -> Result<Self, InvalidGroupTitleError> {
        if (1..=GROUP_TITLE_MAX_LEN).contains(&title.chars().count()) {
            Ok(Self(title))
        } else {
            Err(InvalidGroupTitleError(title))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let allowed = slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if (1..=GROUP_SLUG_MAX_LEN).contains(&slug.len()) && allowed {
            Ok(Self(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Display for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title.get())
    }
}

impl<'de> Deserialize<'de> for GroupTitle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupTitle::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"GroupTitle"))
    }
}

impl<'de> Deserialize<'de> for GroupSlug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        GroupSlug::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"GroupSlug"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        group::{GROUP_SLUG_MAX_LEN, Group, GroupSlug, GroupTitle},
    };

    #[test]
    fn slug_characters() {
        for legal in ["test-slug", "cats_and_dogs", "Group42"] {
            assert!(GroupSlug::new(legal.to_owned()).is_ok(), "{legal}");
        }
        for illegal in ["", "with space", "Тестовый-слаг", "a/b"] {
            assert!(GroupSlug::new(illegal.to_owned()).is_err(), "{illegal}");
        }
        assert!(GroupSlug::new("s".repeat(GROUP_SLUG_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn group_displays_as_title() {
        let group = Group {
            id: Id::new(1),
            title: GroupTitle::new("Test group".to_owned()).unwrap(),
            slug: GroupSlug::new("test-slug".to_owned()).unwrap(),
            description: "Test description".to_owned(),
        };

        assert_eq!(group.to_string(), "Test group");
    }
}
