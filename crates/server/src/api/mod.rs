//! HTTP surface of the authorization server.
//!
//! - `auth` - Bearer token validation and OAuth2 error responses
//! - `policy` - Which routes need a token
//! - `github` - GitHub login exchange (/auth/github)
//! - `account` - Authenticated account endpoints (/api/me)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! OAuth2 token endpoints live in [`crate::oauth2`] and are mounted under `/oauth`.

pub mod account;
pub mod auth;
pub mod github;
pub mod health;
pub mod openapi;
pub mod policy;

pub use account::ACCOUNT_TAG;
pub use github::AUTH_TAG;
pub use health::MISC_TAG;

use crate::AppResources;
use axum::{Router, middleware};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Assemble the full router.
///
/// `application` carries the resource routes of the host application
/// (e.g. `/api/projects`); they are merged in and protected by the same
/// request policy as the built-in routes.
pub fn build_router(resources: AppResources, application: Router) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/auth", github::router())
        .nest("/oauth", crate::oauth2::router())
        .nest("/api", account::router())
        .routes(routes!(health::health))
        .split_for_parts();

    router
        .merge(application)
        .merge(Redoc::with_url("/api-docs", api))
        .layer(middleware::from_fn_with_state(
            resources.clone(),
            policy::enforce,
        ))
        .layer(axum::Extension(resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip_all)]
pub async fn start_webserver(
    resources: AppResources,
    application: Router,
) -> color_eyre::Result<()> {
    let addr = resources.config.listen_addr.clone();
    let router = build_router(resources, application);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
