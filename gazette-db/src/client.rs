use crate::record::{
    AuthenticationRecord, CommentRecord, CredentialsRecord, FullPostRecord, GroupRecord,
    MediaRecord, UserRecord,
};
use gazette_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CreateComment},
        follow::Follow,
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        media::{Media, MediaPath},
        post::{CreatePost, Post, PostContent, PostMarker},
        timestamp_millis,
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    page::PageWindow,
    util::with_random_suffix,
};
use sqlx::{
    SqlitePool,
    migrate::MigrateError,
    query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Attempts at finding a free media path before giving up.
const MEDIA_PATH_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The handle {0} is already taken")]
    HandleTaken(UserHandle),
    #[error("Follow already exists: {0}")]
    DuplicateFollow(Follow),
    #[error("No free media path found for {0}")]
    MediaPathExhausted(MediaPath),
    #[error("Migrating the database failed: {0}")]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(err) if err.is_unique_violation())
}

fn post_query(rest: &str) -> String {
    format!(
        "
        SELECT
            posts.post_id,
            posts.text,
            posts.pub_date,
            posts.image,
            users.user_id,
            users.handle,
            post_groups.group_id,
            post_groups.title AS group_title,
            post_groups.slug AS group_slug,
            post_groups.description AS group_description
        FROM
            posts
            JOIN users ON users.user_id = posts.author_id
            LEFT JOIN post_groups ON post_groups.group_id = posts.group_id
        {rest}
        "
    )
}

fn limit_offset(window: PageWindow) -> (i64, i64) {
    (
        i64::try_from(window.limit).unwrap_or(i64::MAX),
        i64::try_from(window.offset).unwrap_or(i64::MAX),
    )
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(Self::new(pool))
    }

    /// A private database that lives as long as the client. Mainly for tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users
            WHERE
                users.user_id = ?
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_handle(&self, handle: &UserHandle) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.handle
            FROM
                users
            WHERE
                users.handle = ?
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// The user with the stored password hash, for checking a login.
    pub async fn fetch_credentials(&self, handle: &UserHandle) -> Result<Option<(User, String)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.handle,
                users.password_hash
            FROM
                users
            WHERE
                users.handle = ?
            ",
        )
        .bind(handle.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(<(User, String)>::try_from).transpose()?;
        Ok(credentials)
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let result = query(
            "
            INSERT INTO users (handle, password_hash)
            VALUES (?, ?)
            ",
        )
        .bind(user.handle.get())
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(result) => {
                let id = Id::new(result.last_insert_rowid());
                debug!(%id, handle = %user.handle, "Created user");
                Ok(User {
                    id,
                    handle: user.handle.clone(),
                })
            }
            Err(err) if is_unique_violation(&err) => Err(DbError::HandleTaken(user.handle.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the user together with everything they authored or follow.
    pub async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let result = query(
            "
            INSERT INTO post_groups (title, slug, description)
            VALUES (?, ?, ?)
            ",
        )
        .bind(group.title.get())
        .bind(group.slug.get())
        .bind(&group.description)
        .execute(&self.pool)
        .await?;

        let id = Id::new(result.last_insert_rowid());
        debug!(%id, slug = %group.slug, "Created group");

        Ok(Group {
            id,
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    pub async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            WHERE
                post_groups.slug = ?
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    pub async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            ORDER BY
                post_groups.title,
                post_groups.group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }

    /// Posts of a deleted group stay, without a group.
    pub async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let result = query("DELETE FROM post_groups WHERE group_id = ?")
            .bind(group_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(&post_query("WHERE posts.post_id = ?"))
            .bind(post_id.get())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_post_list(
        &self,
        filter: &str,
        key: Option<i64>,
        window: PageWindow,
    ) -> Result<Vec<Post>> {
        let (limit, offset) = limit_offset(window);
        let sql = post_query(&format!(
            "{filter} ORDER BY posts.pub_date DESC, posts.post_id DESC LIMIT ? OFFSET ?"
        ));

        let mut records = query_as::<_, FullPostRecord>(&sql);
        if let Some(key) = key {
            records = records.bind(key);
        }
        let records = records
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn count(&self, sql: &str, key: Option<i64>) -> Result<u64> {
        let mut count = query_scalar::<_, i64>(sql);
        if let Some(key) = key {
            count = count.bind(key);
        }
        let count = count.fetch_one(&self.pool).await?;

        Ok(count.cast_unsigned())
    }

    pub async fn count_posts(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM posts", None).await
    }

    /// All posts, newest first.
    pub async fn fetch_posts(&self, window: PageWindow) -> Result<Vec<Post>> {
        self.fetch_post_list("", None, window).await
    }

    pub async fn count_user_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM posts WHERE posts.author_id = ?",
            Some(user_id.get()),
        )
        .await
    }

    pub async fn fetch_user_posts(
        &self,
        user_id: Id<UserMarker>,
        window: PageWindow,
    ) -> Result<Vec<Post>> {
        self.fetch_post_list("WHERE posts.author_id = ?", Some(user_id.get()), window)
            .await
    }

    pub async fn fetch_group_posts(
        &self,
        group_id: Id<GroupMarker>,
        window: PageWindow,
    ) -> Result<Vec<Post>> {
        self.fetch_post_list("WHERE posts.group_id = ?", Some(group_id.get()), window)
            .await
    }

    pub async fn count_feed_posts(&self, user_id: Id<UserMarker>) -> Result<u64> {
        self.count(
            "
            SELECT COUNT(*)
            FROM posts
            WHERE posts.author_id IN (SELECT follows.author_id FROM follows WHERE follows.user_id = ?)
            ",
            Some(user_id.get()),
        )
        .await
    }

    /// Posts by every author `user_id` follows.
    pub async fn fetch_feed_posts(
        &self,
        user_id: Id<UserMarker>,
        window: PageWindow,
    ) -> Result<Vec<Post>> {
        self.fetch_post_list(
            "WHERE posts.author_id IN (SELECT follows.author_id FROM follows WHERE follows.user_id = ?)",
            Some(user_id.get()),
            window,
        )
        .await
    }

    /// Stamps the post with the current time. Does not validate the text.
    pub async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        self.create_post_at(post, OffsetDateTime::now_utc()).await
    }

    pub async fn create_post_at(
        &self,
        post: &CreatePost,
        pub_date: OffsetDateTime,
    ) -> Result<Id<PostMarker>> {
        let result = query(
            "
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(&post.content.text)
        .bind(timestamp_millis(pub_date))
        .bind(post.author.get())
        .bind(post.content.group.map(Id::get))
        .bind(post.content.image.as_ref().map(MediaPath::get))
        .execute(&self.pool)
        .await?;

        let id = Id::new(result.last_insert_rowid());
        debug!(%id, author = %post.author, "Created post");
        Ok(id)
    }

    /// Replaces the editable fields and the author. `pub_date` stays untouched.
    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &PostContent,
    ) -> Result<bool> {
        let result = query(
            "
            UPDATE posts
            SET text = ?, group_id = ?, image = ?, author_id = ?
            WHERE post_id = ?
            ",
        )
        .bind(&content.text)
        .bind(content.group.map(Id::get))
        .bind(content.image.as_ref().map(MediaPath::get))
        .bind(author.get())
        .bind(post_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = ?")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let created = OffsetDateTime::now_utc();
        let created_millis = timestamp_millis(created);

        let result = query(
            "
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(&comment.text)
        .bind(created_millis)
        .execute(&self.pool)
        .await?;

        let record = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created,
                users.user_id,
                users.handle
            FROM
                comments
                JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.comment_id = ?
            ",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(&self.pool)
        .await?;

        let comment = Comment::try_from(record)?;
        debug!(id = %comment.id, post = %comment.post, "Created comment");
        Ok(comment)
    }

    /// Comments on a post, newest first.
    pub async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created,
                users.user_id,
                users.handle
            FROM
                comments
                JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.post_id = ?
            ORDER BY
                comments.created DESC,
                comments.comment_id DESC
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    pub async fn count_comments(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM comments", None).await
    }

    /// Inserts the pair, failing with [`DbError::DuplicateFollow`] if it exists.
    pub async fn create_follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<()> {
        let result = query("INSERT INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(DbError::DuplicateFollow(Follow { user, author }))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts the pair unless it exists. Returns whether a new pair was created.
    pub async fn follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let result = query(
            "
            INSERT INTO follows (user_id, author_id)
            VALUES (?, ?)
            ON CONFLICT (user_id, author_id) DO NOTHING
            ",
        )
        .bind(user.get())
        .bind(author.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a pair was removed.
    pub async fn unfollow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count_follows(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<u64> {
        let count = query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE user_id = ? AND author_id = ?",
        )
        .bind(user.get())
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.cast_unsigned())
    }

    pub async fn is_following(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        Ok(self.count_follows(user, author).await? > 0)
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let created_at = PrimitiveDateTime::new(
            authentication.created_at.date(),
            authentication.created_at.time(),
        );

        query(
            "
            INSERT INTO authentications (token_hash, user_id, created_at, expires_after_seconds)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(authentication.user.get())
        .bind(created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_id,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                authentications
            WHERE
                authentications.token_hash = ?
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM authentications WHERE token_hash = ?")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stores the bytes under `directory/file_name`, adding a random suffix to
    /// the name while that path is taken. Returns the path actually used.
    pub async fn store_media(
        &self,
        directory: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<MediaPath> {
        let mut path = MediaPath::in_directory(directory, file_name);

        for _ in 0..MEDIA_PATH_ATTEMPTS {
            let result = query(
                "
                INSERT INTO media (path, content_type, data)
                VALUES (?, ?, ?)
                ON CONFLICT (path) DO NOTHING
                ",
            )
            .bind(path.get())
            .bind(content_type)
            .bind(data)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                debug!(%path, content_type, "Stored media");
                return Ok(path);
            }

            path = MediaPath::in_directory(directory, &with_random_suffix(file_name));
        }

        Err(DbError::MediaPathExhausted(path))
    }

    pub async fn fetch_media(&self, path: &MediaPath) -> Result<Option<Media>> {
        let record = query_as::<_, MediaRecord>(
            "
            SELECT
                media.path,
                media.content_type,
                media.data
            FROM
                media
            WHERE
                media.path = ?
            ",
        )
        .bind(path.get())
        .fetch_optional(&self.pool)
        .await?;

        let media = record.map(Media::try_from).transpose()?;
        Ok(media)
    }
}
