use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use cache::PageCache;
use gazette_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
        post::PostMarker,
    },
    util::PositiveDuration,
};
use gazette_db::client::{DbClient, DbError};
use render::Template;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

pub mod auth;
pub mod cache;
mod render;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub page_cache: PageCache,
    pub auth_settings: AuthSettings,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthSettings {
    /// Tokens never expire when unset.
    pub token_lifetime: Option<PositiveDuration>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Login required to access {next}")]
    LoginRequired { next: String },
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with handle {0} was not found.")]
    UserByHandleNotFound(String),
    #[error("Group with slug {0} was not found.")]
    GroupBySlugNotFound(String),
    #[error("Media at {0} was not found.")]
    MediaNotFound(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByHandleNotFound(_)
            | ServerError::GroupBySlugNotFound(_)
            | ServerError::MediaNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::LoginRequired { .. } => StatusCode::SEE_OTHER,
            ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn template(status: StatusCode) -> &'static str {
        match status {
            StatusCode::NOT_FOUND => "core/404.html",
            StatusCode::INTERNAL_SERVER_ERROR => "core/500.html",
            _ => "core/error.html",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
struct ErrorContext {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let ServerError::LoginRequired { next } = &self {
            debug!(next, "Redirecting to login");
            return Redirect::to(&auth::login_url(next)).into_response();
        }

        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let context = ErrorContext {
            status: status.as_u16(),
        };
        (status, Template::new(Self::template(status), context)).into_response()
    }
}
