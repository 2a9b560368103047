//! Request authorization policy.
//!
//! Read-only discovery routes, the authentication exchange, the OAuth2 token
//! endpoints and operational endpoints are public. Every other request needs
//! a valid bearer token carrying `ROLE_USER`.

use crate::AppResources;
use crate::api::auth::authenticate_request;
use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Routes readable without a token (GET only).
pub const PUBLIC_READ_ROUTES: [&str; 2] = ["/api/projects", "/api/technologies"];

/// Path prefixes reachable without a token, any method.
const PUBLIC_PREFIXES: [&str; 3] = ["/auth/", "/oauth/", "/api-docs/"];

const PUBLIC_PATHS: [&str; 2] = ["/healthz", "/api-docs"];

pub fn is_public(method: &Method, path: &str) -> bool {
    if method == Method::GET && PUBLIC_READ_ROUTES.contains(&path) {
        return true;
    }
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Middleware enforcing [`is_public`] or a valid bearer token.
pub async fn enforce(
    State(resources): State<AppResources>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let outcome = authenticate_request(&resources, request.headers()).await;
    match outcome {
        Ok(user) => {
            tracing::debug!(email = %user.email, path = %request.uri().path(), "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
