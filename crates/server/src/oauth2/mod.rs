//! OAuth2 authorization server.
//!
//! ## Endpoints
//!
//! - `POST /oauth/token` - Token endpoint (refresh grant)
//! - `POST /oauth/revoke` - Token revocation

pub mod client;
pub mod endpoints;
pub mod identity;
pub mod token;

pub use client::ClientRegistration;
pub use endpoints::router;
pub use identity::UserStore;
pub use token::{AccessToken, Principal, TokenIssuer};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
