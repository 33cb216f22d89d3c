use crate::model::{
    Id,
    group::{Group, GroupMarker},
    media::MediaPath,
    truncated,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

pub const POST_DISPLAY_LEN: usize = 15;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<MediaPath>,
}

/// The author-editable part of a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: String,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<MediaPath>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
}

impl Post {
    #[must_use]
    pub fn content(&self) -> PostContent {
        PostContent {
            text: self.text.clone(),
            group: self.group.as_ref().map(|group| group.id),
            image: self.image.clone(),
        }
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(truncated(&self.text, POST_DISPLAY_LEN))
    }
}
