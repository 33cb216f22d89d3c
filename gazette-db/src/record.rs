use gazette_common::{
    model::{
        ModelValidationError,
        auth::Authentication,
        comment::Comment,
        from_timestamp_millis,
        group::{Group, GroupSlug, GroupTitle},
        media::{Media, MediaPath},
        post::Post,
        user::{User, UserHandle},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::PrimitiveDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    pub user_id: i64,
    pub handle: String,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct GroupRecord {
    pub group_id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post joined with its author and, if any, its group.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_id: i64,
    pub text: String,
    pub pub_date: i64,
    pub image: Option<String>,
    pub user_id: i64,
    pub handle: String,
    pub group_id: Option<i64>,
    pub group_title: Option<String>,
    pub group_slug: Option<String>,
    pub group_description: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub text: String,
    pub created: i64,
    pub user_id: i64,
    pub handle: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_id: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct MediaRecord {
    pub path: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
        })
    }
}

impl TryFrom<CredentialsRecord> for (User, String) {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        let user = User {
            id: value.user_id.into(),
            handle: UserHandle::new(value.handle)?,
        };
        Ok((user, value.password_hash))
    }
}

impl TryFrom<GroupRecord> for Group {
    type Error = ModelValidationError;

    fn try_from(value: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.group_id.into(),
            title: GroupTitle::new(value.title)?,
            slug: GroupSlug::new(value.slug)?,
            description: value.description,
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        let group = match (
            value.group_id,
            value.group_title,
            value.group_slug,
            value.group_description,
        ) {
            (Some(group_id), Some(title), Some(slug), Some(description)) => Some(Group {
                id: group_id.into(),
                title: GroupTitle::new(title)?,
                slug: GroupSlug::new(slug)?,
                description,
            }),
            _ => None,
        };

        Ok(Self {
            id: value.post_id.into(),
            text: value.text,
            pub_date: from_timestamp_millis(value.pub_date)?,
            author: User {
                id: value.user_id.into(),
                handle: UserHandle::new(value.handle)?,
            },
            group,
            image: value.image.map(MediaPath::new).transpose()?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.comment_id.into(),
            post: value.post_id.into(),
            author: User {
                id: value.user_id.into(),
                handle: UserHandle::new(value.handle)?,
            },
            text: value.text,
            created: from_timestamp_millis(value.created)?,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_id.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}

impl TryFrom<MediaRecord> for Media {
    type Error = ModelValidationError;

    fn try_from(value: MediaRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            path: MediaPath::new(value.path)?,
            content_type: value.content_type,
            data: value.data,
        })
    }
}
