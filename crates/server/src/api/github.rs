//! GitHub login exchange endpoint (`/auth/github`).

use crate::AppResources;
use crate::api::auth::AuthError;
use crate::oauth2::token::AccessToken;
use axum::{
    Extension, Json,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const AUTH_TAG: &str = "Authentication";

/// Body posted by the frontend after GitHub redirected back with a code.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitHubLoginRequest {
    /// Authorization code issued by GitHub
    #[serde(default)]
    pub code: String,
    /// Redirect URI used when requesting the code
    #[serde(default)]
    pub redirect_uri: String,
}

/// Creates the `/auth` router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(github_login))
}

/// Token responses must not be cached (RFC 6749 section 5.1).
pub(crate) fn token_response(token: AccessToken) -> Response {
    (
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(token),
    )
        .into_response()
}

#[tracing::instrument(skip_all, fields(redirect_uri = %payload.redirect_uri))]
#[utoipa::path(
    post,
    path = "/github",
    tag = AUTH_TAG,
    operation_id = "GitHub Login",
    summary = "Exchange a GitHub authorization code for an access token",
    description = "Exchanges the authorization code GitHub returned to the frontend, resolves the \
                   GitHub account's verified email to a local user (creating it on first login) \
                   and issues an access token with the `ROLE_USER` authority.\n\n\
                   GitHub authorization codes are single use: posting the same code twice fails.",
    request_body = GitHubLoginRequest,
    responses(
        (status = 200, description = "Token issued", body = AccessToken),
        (status = 401, description = "GitHub rejected the code or the account has no verified email", body = AuthError),
        (status = 502, description = "GitHub could not be reached", body = AuthError),
        (status = 500, description = "Persistence or token signing failure", body = AuthError),
    )
)]
pub async fn github_login(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<GitHubLoginRequest>,
) -> Result<Response, AuthError> {
    let token = resources
        .auth
        .authorize_github_user(&payload.code, &payload.redirect_uri)
        .await?;
    Ok(token_response(token))
}
