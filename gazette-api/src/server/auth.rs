use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{request::Parts, uri::PathAndQuery},
};
use axum_extra::TypedHeader;
use gazette_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::{User, UserMarker},
};
use gazette_db::client::DbClient;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::UtcDateTime;

pub const LOGIN_PATH: &str = "/auth/login/";

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The user behind a valid bearer token.
///
/// Handlers requiring a login take this directly. Without an `Authorization`
/// header the request is redirected to the login page, carrying the original
/// path and query as `next`. Handlers that merely adapt to the viewer take an
/// `Option<AuthenticatedUser>` instead.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    user: User,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }

    /// Hash of the token this request was authenticated with.
    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

#[must_use]
pub fn login_url(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match <Self as OptionalFromRequestParts<S>>::from_request_parts(parts, state).await? {
            Some(user) => Ok(user),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path(), PathAndQuery::as_str);
                Err(ServerError::LoginRequired {
                    next: next.to_owned(),
                })
            }
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let header =
            match <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
            {
                Ok(header) => header,
                Err(rejection) if rejection.is_missing() => return Ok(None),
                Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
            };

        let request_token: AuthToken = header.token().parse()?;
        let token_hash = request_token.hash()?;

        let db = Arc::<DbClient>::from_ref(state);
        let authentication = db
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        if authentication.user != request_token.user_id
            || authentication.is_expired_at(UtcDateTime::now())
        {
            return Err(ServerError::InvalidToken);
        }

        let user = db
            .fetch_user(authentication.user)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        Ok(Some(Self { user, token_hash }))
    }
}
