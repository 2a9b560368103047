//! OAuth2 HTTP endpoints.
//!
//! - Token endpoint (refresh grant)
//! - Token revocation (RFC 7009)
//!
//! Both authenticate the registered client with HTTP Basic auth or with
//! `client_id`/`client_secret` form fields.

use crate::AppResources;
use crate::api::auth::AuthError;
use crate::api::github::token_response;
use crate::error::TokenError;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::client::{GRANT_REFRESH_TOKEN, KNOWN_GRANT_TYPES};
use crate::oauth2::token::AccessToken;
use axum::{
    Extension, Form,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .routes(routes!(revoke))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    #[serde(default)]
    pub grant_type: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeRequest {
    #[serde(default)]
    pub token: String,
    /// Accepted and ignored; both token kinds revoke the same grant
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[tracing::instrument(skip_all, fields(grant_type = %params.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange a refresh token for a new token pair",
    description = "Issues a new access and refresh token for a refresh token previously issued to \
                   the same client. Refresh tokens rotate: the presented one is revoked and any \
                   later use of it fails with `invalid_grant`.\n\n\
                   **Client authentication:** HTTP Basic auth, or `client_id` and `client_secret` \
                   in the body.\n\n\
                   Users obtain their first token through `/auth/github`.",
    security(
        ("client_auth" = [])
    ),
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued successfully", body = AccessToken),
        (status = 400, description = "Invalid request, unsupported grant or invalid refresh token", body = AuthError),
        (status = 401, description = "Invalid client credentials", body = AuthError),
    )
)]
pub async fn token(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Result<Response, AuthError> {
    let (client_id, client_secret) =
        extract_client_credentials(&headers, params.client_id.clone(), params.client_secret.clone());
    let client_id = client_id.ok_or_else(AuthError::invalid_client)?;
    if !resources
        .client
        .authenticate(&client_id, client_secret.as_deref())
    {
        tracing::warn!(client_id = %client_id, "Client authentication failed");
        return Err(AuthError::invalid_client());
    }

    let grant_type = params.grant_type.as_str();
    if grant_type.is_empty() {
        return Err(AuthError::invalid_request("grant_type is required"));
    }
    if !KNOWN_GRANT_TYPES.contains(&grant_type) {
        return Err(AuthError::unsupported_grant_type(grant_type));
    }
    if !resources.client.supports_grant(grant_type) {
        return Err(AuthError::unauthorized_client(grant_type));
    }
    if grant_type != GRANT_REFRESH_TOKEN {
        return Err(AuthError::unsupported_grant_type(grant_type));
    }

    let refresh_token = params
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::invalid_request("refresh_token is required"))?;

    match resources.tokens.refresh(refresh_token, &resources.client).await {
        Ok(token) => Ok(token_response(token)),
        Err(TokenError::Database(e)) => {
            tracing::error!("Database error refreshing token: {}", e);
            Err(AuthError::server_error())
        }
        Err(e @ (TokenError::Encoding(_) | TokenError::Key(_))) => {
            tracing::error!("Failed to sign refreshed token: {}", e);
            Err(AuthError::server_error())
        }
        Err(e) => {
            tracing::info!("Refresh rejected: {}", e);
            Err(AuthError::invalid_grant(e.to_string()))
        }
    }
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke Token",
    summary = "Revoke an access or refresh token",
    description = "Revokes the grant an access or refresh token belongs to. Both tokens of the \
                   pair stop working. Implements RFC 7009 (OAuth 2.0 Token Revocation).\n\n\
                   **Behavior:**\n\
                   - Returns 200 OK even if the token was already revoked, is unknown or is malformed\n\
                   - Tokens issued to another client are left untouched",
    security(
        ("client_auth" = [])
    ),
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token revocation request"
    ),
    responses(
        (status = 200, description = "Token revoked successfully (or was already invalid)"),
        (status = 400, description = "Missing token parameter", body = AuthError),
        (status = 401, description = "Invalid client credentials", body = AuthError),
    )
)]
pub async fn revoke(
    Extension(resources): Extension<AppResources>,
    headers: HeaderMap,
    Form(params): Form<RevokeRequest>,
) -> Result<Response, AuthError> {
    let (client_id, client_secret) =
        extract_client_credentials(&headers, params.client_id.clone(), params.client_secret.clone());
    let client_id = client_id.ok_or_else(AuthError::invalid_client)?;
    if !resources
        .client
        .authenticate(&client_id, client_secret.as_deref())
    {
        return Err(AuthError::invalid_client());
    }

    if params.token.is_empty() {
        return Err(AuthError::invalid_request("token is required"));
    }

    match resources.tokens.revoke(&params.token, &client_id).await {
        Ok(revoked) => tracing::debug!(revoked, "Processed revocation request"),
        Err(TokenError::Database(e)) => {
            tracing::error!("Database error revoking token: {}", e);
            return Err(AuthError::server_error());
        }
        Err(e) => tracing::debug!("Ignoring revocation of unusable token: {}", e),
    }

    Ok((StatusCode::OK, [(header::CACHE_CONTROL, "no-store")]).into_response())
}

/// Client credentials from HTTP Basic auth, falling back to the form body.
fn extract_client_credentials(
    headers: &HeaderMap,
    form_id: Option<String>,
    form_secret: Option<String>,
) -> (Option<String>, Option<String>) {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        && let Ok(decoded) =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, auth.trim())
        && let Ok(creds) = String::from_utf8(decoded)
        && let Some((id, secret)) = creds.split_once(':')
    {
        return (Some(id.to_string()), Some(secret.to_string()));
    }

    (form_id, form_secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use base64::Engine;

    #[test]
    fn test_basic_credentials_take_precedence() {
        let mut headers = HeaderMap::new();
        let encoded = base64::engine::general_purpose::STANDARD.encode("cvmaker:s3cret");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );

        let (id, secret) =
            extract_client_credentials(&headers, Some("form".into()), Some("other".into()));
        assert_eq!(id.as_deref(), Some("cvmaker"));
        assert_eq!(secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_form_credentials_fallback() {
        let headers = HeaderMap::new();
        let (id, secret) =
            extract_client_credentials(&headers, Some("cvmaker".into()), None);
        assert_eq!(id.as_deref(), Some("cvmaker"));
        assert_eq!(secret, None);
    }

    #[test]
    fn test_malformed_basic_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic not-base64!!"),
        );
        let (id, _) = extract_client_credentials(&headers, Some("cvmaker".into()), None);
        assert_eq!(id.as_deref(), Some("cvmaker"));
    }
}
