use crate::server::{
    AuthSettings, Result, ServerRouter,
    auth::{AuthenticatedUser, LOGIN_PATH},
    render::{Json, Template},
};
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use gazette_common::{
    form::{
        BoundForm, CredentialsForm, FormErrors, INVALID_LOGIN, NON_FIELD_ERRORS, USERNAME_TAKEN,
    },
    model::{
        auth::{AuthToken, Authentication, hash_password, verify_password},
        user::{CreateUser, User},
    },
};
use gazette_db::client::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::UtcDateTime;
use tracing::info;

const LOGIN_TEMPLATE: &str = "users/login.html";
const SIGNUP_TEMPLATE: &str = "users/signup.html";

pub fn routes() -> ServerRouter {
    Router::new()
        .route("/auth/signup/", get(signup_form).post(signup))
        .route(LOGIN_PATH, get(login_form).post(login))
        .route("/auth/logout/", post(logout))
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

impl LoginQuery {
    /// The continuation target, if it stays on this site.
    fn local_next(self) -> Option<String> {
        self.next
            .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
    }
}

#[derive(Serialize)]
struct CredentialsContext {
    form: BoundForm<CredentialsForm>,
    next: Option<String>,
}

/// A freshly issued session.
#[derive(Serialize)]
struct Session {
    user: User,
    token: String,
    /// Where the client was headed before it had to log in.
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
}

fn credentials_page(
    template: &'static str,
    form: CredentialsForm,
    errors: FormErrors,
    next: Option<String>,
) -> Response {
    let context = CredentialsContext {
        form: BoundForm::with_errors(form, errors),
        next,
    };
    (StatusCode::BAD_REQUEST, Template::new(template, context)).into_response()
}

async fn issue_session(db: &DbClient, settings: AuthSettings, user: User) -> Result<Session> {
    let token = AuthToken::generate_random(user.id);

    let authentication = Authentication {
        user: user.id,
        token_hash: token.hash()?,
        created_at: UtcDateTime::now(),
        expires_after: settings.token_lifetime,
    };
    db.create_auth(&authentication).await?;

    Ok(Session {
        user,
        token: token.as_token_str(),
        next: None,
    })
}

async fn signup_form() -> Template<CredentialsContext> {
    Template::new(
        SIGNUP_TEMPLATE,
        CredentialsContext {
            form: BoundForm::default(),
            next: None,
        },
    )
}

async fn signup(
    State(db): State<Arc<DbClient>>,
    State(settings): State<AuthSettings>,
    Json(form): Json<CredentialsForm>,
) -> Result<Response> {
    let credentials = match form.clean_signup() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(credentials_page(SIGNUP_TEMPLATE, form, errors, None)),
    };

    let new_user = CreateUser {
        handle: credentials.handle,
        password_hash: hash_password(&credentials.password)?,
    };
    let user = match db.create_user(&new_user).await {
        Ok(user) => user,
        Err(DbError::HandleTaken(_)) => {
            let mut errors = FormErrors::default();
            errors.add("username", USERNAME_TAKEN);
            return Ok(credentials_page(SIGNUP_TEMPLATE, form, errors, None));
        }
        Err(err) => return Err(err.into()),
    };
    info!(%user, "User signed up");

    let session = issue_session(&db, settings, user).await?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

async fn login_form(Query(query): Query<LoginQuery>) -> Template<CredentialsContext> {
    Template::new(
        LOGIN_TEMPLATE,
        CredentialsContext {
            form: BoundForm::default(),
            next: query.local_next(),
        },
    )
}

async fn login(
    State(db): State<Arc<DbClient>>,
    State(settings): State<AuthSettings>,
    Query(query): Query<LoginQuery>,
    Json(form): Json<CredentialsForm>,
) -> Result<Response> {
    let next = query.local_next();

    let credentials = match form.clean_login() {
        Ok(credentials) => credentials,
        Err(errors) => return Ok(credentials_page(LOGIN_TEMPLATE, form, errors, next)),
    };

    let user = db
        .fetch_credentials(&credentials.handle)
        .await?
        .filter(|(_, password_hash)| verify_password(&credentials.password, password_hash))
        .map(|(user, _)| user);

    let Some(user) = user else {
        let mut errors = FormErrors::default();
        errors.add(NON_FIELD_ERRORS, INVALID_LOGIN);
        return Ok(credentials_page(LOGIN_TEMPLATE, form, errors, next));
    };
    info!(%user, "User logged in");

    let session = Session {
        next,
        ..issue_session(&db, settings, user).await?
    };
    Ok(Json(session).into_response())
}

async fn logout(State(db): State<Arc<DbClient>>, user: AuthenticatedUser) -> Result<Redirect> {
    db.delete_auth(user.token_hash()).await?;
    info!(user = %user.user(), "User logged out");

    Ok(Redirect::to("/"))
}
