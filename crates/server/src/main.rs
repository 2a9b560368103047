use axum::Router;
use cvmaker_auth::AppResources;
use cvmaker_auth::api::start_webserver;
use cvmaker_auth::config::load_config_or_panic;
use cvmaker_auth::oauth2::token::spawn_purge_task;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "cvmaker_auth=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    dotenvy::dotenv().ok();

    initialize_tracing();

    let config = Arc::new(load_config_or_panic());
    tracing::info!(
        client_id = %config.oauth2.client_id,
        algorithm = ?config.oauth2.signing.algorithm,
        access_token_lifetime = config.oauth2.access_token_lifetime,
        refresh_token_lifetime = config.oauth2.refresh_token_lifetime,
        "OAuth2 configuration"
    );

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    let resources = AppResources::new(db, config)?;

    // Remove grants whose refresh token expired
    spawn_purge_task(resources.tokens.clone());

    // Resource routes of the CV maker itself are mounted by embedding
    // applications; the standalone binary serves the auth endpoints only.
    start_webserver(resources, Router::new()).await?;
    Ok(())
}
