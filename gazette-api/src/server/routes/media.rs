use crate::server::{Result, ServerError, ServerRouter};
use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use gazette_common::model::media::MediaPath;
use gazette_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    Router::new().typed_get(media)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/media/{*path}", rejection(ServerError))]
struct MediaFilePath {
    path: String,
}

async fn media(
    MediaFilePath { path }: MediaFilePath,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    let media_path =
        MediaPath::new(path.clone()).map_err(|_| ServerError::MediaNotFound(path.clone()))?;

    let media = db
        .fetch_media(&media_path)
        .await?
        .ok_or(ServerError::MediaNotFound(path))?;

    Ok(([(header::CONTENT_TYPE, media.content_type)], media.data).into_response())
}
