use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    render::Template,
    routes::{FOLLOW_INDEX_PATH, PageQuery, find_user, profile_url},
};
use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use axum_extra::routing::{RouterExt, TypedPath};
use gazette_common::{
    model::{post::Post, user::User},
    page::{POSTS_PER_PAGE, Page, Paginator},
};
use gazette_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    Router::new()
        .route(FOLLOW_INDEX_PATH, get(follow_index))
        .typed_get(profile)
        .typed_get(profile_alias)
        .typed_post(profile_follow)
        .typed_post(profile_unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
struct ProfilePath {
    username: String,
}

/// Profiles are reachable directly under the root as well.
#[derive(TypedPath, Deserialize)]
#[typed_path("/{username}/", rejection(ServerError))]
struct ProfileAliasPath {
    username: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct FollowPath {
    username: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct UnfollowPath {
    username: String,
}

#[derive(Serialize)]
struct ProfileContext {
    title: String,
    author: User,
    number_posts: u64,
    following: bool,
    page_obj: Page<Post>,
}

#[derive(Serialize)]
struct FollowContext {
    page_obj: Page<Post>,
    index: bool,
    follow: bool,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Template<ProfileContext>> {
    render_profile(&db, &username, viewer, page.as_deref()).await
}

async fn profile_alias(
    ProfileAliasPath { username }: ProfileAliasPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Template<ProfileContext>> {
    render_profile(&db, &username, viewer, page.as_deref()).await
}

async fn render_profile(
    db: &DbClient,
    username: &str,
    viewer: Option<AuthenticatedUser>,
    page: Option<&str>,
) -> Result<Template<ProfileContext>> {
    let author = find_user(db, username).await?;

    let number_posts = db.count_user_posts(author.id).await?;
    let window = Paginator::new(number_posts, POSTS_PER_PAGE).get_page(page);
    let posts = db.fetch_user_posts(author.id, window).await?;

    let following = match viewer {
        Some(viewer) => db.is_following(viewer.user_id(), author.id).await?,
        None => false,
    };

    Ok(Template::new(
        "posts/profile.html",
        ProfileContext {
            title: format!("Profile of user {}", author.handle),
            author,
            number_posts,
            following,
            page_obj: window.into_page(posts),
        },
    ))
}

async fn follow_index(
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Template<FollowContext>> {
    let count = db.count_feed_posts(user.user_id()).await?;
    let window = Paginator::new(count, POSTS_PER_PAGE).get_page(page.as_deref());
    let posts = db.fetch_feed_posts(user.user_id(), window).await?;

    Ok(Template::new(
        "posts/follow.html",
        FollowContext {
            page_obj: window.into_page(posts),
            index: false,
            follow: true,
        },
    ))
}

async fn profile_follow(
    FollowPath { username }: FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = find_user(&db, &username).await?;

    if author.id == user.user_id() {
        return Ok(Redirect::to(&profile_url(&author.handle)));
    }

    if db.follow(user.user_id(), author.id).await? {
        info!(user = %user.user(), %author, "Follow created");
    }

    Ok(Redirect::to(FOLLOW_INDEX_PATH))
}

async fn profile_unfollow(
    UnfollowPath { username }: UnfollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Redirect> {
    let author = find_user(&db, &username).await?;

    if db.unfollow(user.user_id(), author.id).await? {
        info!(user = %user.user(), %author, "Follow removed");
    }

    Ok(Redirect::to(FOLLOW_INDEX_PATH))
}
