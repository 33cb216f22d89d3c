use gazette_common::util::{NonPositiveDurationError, PositiveDuration};
use gazette_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::{AuthSettings, ServerState, cache::PageCache};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid auth token lifetime: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_database_url() -> String {
    "sqlite://gazette.db".to_owned()
}

fn default_page_cache_ttl_seconds() -> u64 {
    server::cache::DEFAULT_PAGE_CACHE_TTL.as_secs()
}

fn default_page_cache_capacity() -> u64 {
    server::cache::DEFAULT_PAGE_CACHE_CAPACITY
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    #[serde(default = "default_database_url")]
    database_url: String,
    #[serde(default = "default_page_cache_ttl_seconds")]
    page_cache_ttl_seconds: u64,
    #[serde(default = "default_page_cache_capacity")]
    page_cache_capacity: u64,
    #[serde(default)]
    auth_token_lifetime_seconds: Option<i64>,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gazette_api=debug,\
                gazette_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for ctrl-c, shutting down");
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_client = DbClient::connect(&env.database_url).await?;
    db_client.migrate().await?;

    let auth_settings = AuthSettings {
        token_lifetime: env
            .auth_token_lifetime_seconds
            .map(PositiveDuration::from_seconds)
            .transpose()?,
    };
    let state = ServerState {
        db_client: Arc::new(db_client),
        page_cache: PageCache::new(
            Duration::from_secs(env.page_cache_ttl_seconds),
            env.page_cache_capacity,
        ),
        auth_settings,
    };

    let app = server::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
