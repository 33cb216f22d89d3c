use crate::server::{Result, ServerError, ServerRouter, render::Template, routes::PageQuery};
use axum::{
    Router,
    extract::{Query, State},
};
use axum_extra::routing::{RouterExt, TypedPath};
use gazette_common::{
    model::{
        group::{Group, GroupSlug},
        post::Post,
    },
    page::{POSTS_PER_PAGE, Page, Paginator},
};
use gazette_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Only this many of a group's newest posts are ever listed.
const GROUP_POSTS_LIMIT: u64 = 10;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(group_posts)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPostsPath {
    slug: String,
}

#[derive(Serialize)]
struct GroupPostsContext {
    title: String,
    group: Group,
    page_obj: Page<Post>,
}

async fn group_posts(
    GroupPostsPath { slug }: GroupPostsPath,
    State(db): State<Arc<DbClient>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Template<GroupPostsContext>> {
    let not_found = || ServerError::GroupBySlugNotFound(slug.clone());

    let group_slug = GroupSlug::new(slug.clone()).map_err(|_| not_found())?;
    let group = db
        .fetch_group_by_slug(&group_slug)
        .await?
        .ok_or_else(not_found)?;

    let newest = Paginator::new(GROUP_POSTS_LIMIT, GROUP_POSTS_LIMIT).get_page(None);
    let posts = db.fetch_group_posts(group.id, newest).await?;

    let count = u64::try_from(posts.len()).unwrap_or(GROUP_POSTS_LIMIT);
    let page_obj = Paginator::new(count, POSTS_PER_PAGE)
        .get_page(page.as_deref())
        .slice(posts);

    Ok(Template::new(
        "posts/group_list.html",
        GroupPostsContext {
            title: format!("Group posts {group}"),
            group,
            page_obj,
        },
    ))
}
