use crate::server::{Result, ServerError, ServerRouter};
use axum::Router;
use gazette_common::model::{
    Id,
    post::PostMarker,
    user::{User, UserHandle},
};
use gazette_db::client::DbClient;
use serde::Deserialize;

mod auth;
mod groups;
mod media;
mod posts;
mod profiles;

pub const FOLLOW_INDEX_PATH: &str = "/follow/";

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(posts::routes())
        .merge(groups::routes())
        .merge(auth::routes())
        .merge(media::routes())
        .merge(profiles::routes())
}

/// The raw `page` query parameter of listing pages.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct PageQuery {
    page: Option<String>,
}

fn profile_url(handle: &UserHandle) -> String {
    format!("/profile/{}/", urlencoding::encode(handle.get()))
}

fn post_url(id: Id<PostMarker>) -> String {
    format!("/posts/{id}/")
}

async fn find_user(db: &DbClient, username: &str) -> Result<User> {
    let not_found = || ServerError::UserByHandleNotFound(username.to_owned());

    let handle = UserHandle::new(username.to_owned()).map_err(|_| not_found())?;
    db.fetch_user_by_handle(&handle).await?.ok_or_else(not_found)
}
