//! OAuth2 authorization and resource server for the CV maker.
//!
//! Issues signed JWT access tokens for the statically registered client,
//! protects the application's `/api` routes and lets users sign in with
//! their GitHub account.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::github::GitHubGateway;
use crate::oauth2::client::ClientRegistration;
use crate::oauth2::identity::UserStore;
use crate::oauth2::token::TokenIssuer;

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod github;
pub mod oauth2;

/// Process-wide services shared by every request.
#[derive(Clone)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub client: Arc<ClientRegistration>,
    pub tokens: TokenIssuer,
    pub auth: AuthService,
}

impl AppResources {
    /// Wire the services from configuration. Fails on unusable signing keys
    /// or when the HTTP client for GitHub cannot be built.
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> color_eyre::Result<Self> {
        let client = ClientRegistration::from_config(&config.oauth2);
        let tokens = TokenIssuer::new(db.clone(), &config.oauth2)?;
        let gateway = GitHubGateway::new(&config.github)?;
        let auth = AuthService::new(
            gateway,
            UserStore::new(db.clone()),
            tokens.clone(),
            client.clone(),
        );

        Ok(Self {
            db,
            config,
            client: Arc::new(client),
            tokens,
            auth,
        })
    }
}
