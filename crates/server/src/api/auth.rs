//! Bearer authentication and OAuth2 error responses.

use crate::AppResources;
use crate::error::{AuthFlowError, TokenError};
use crate::oauth2::client::ROLE_USER;
use crate::oauth2::token::TokenClaims;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Represents the identity proven by a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// User's email address (the token principal)
    pub email: String,
    pub authorities: Vec<String>,
    /// Client the token was issued to
    pub client_id: String,
    pub scopes: Vec<String>,
    /// Access token id
    pub token_id: String,
}

impl AuthenticatedUser {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

impl From<TokenClaims> for AuthenticatedUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            email: claims.user_name,
            authorities: claims.authorities,
            client_id: claims.client_id,
            scopes: claims.scope,
            token_id: claims.jti,
        }
    }
}

/// OAuth2 style error body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthError {
    /// Error code (e.g., "invalid_token", "invalid_grant")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl AuthError {
    fn new(error: &str, description: Option<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description,
        }
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new("invalid_token", Some(description.into()))
    }

    pub fn insufficient_scope(required_authority: &str) -> Self {
        Self::new(
            "insufficient_scope",
            Some(format!("Token requires '{required_authority}' authority")),
        )
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new("invalid_request", Some(description.into()))
    }

    pub fn invalid_client() -> Self {
        Self::new("invalid_client", None)
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new("invalid_grant", Some(description.into()))
    }

    pub fn unauthorized_client(grant_type: &str) -> Self {
        Self::new(
            "unauthorized_client",
            Some(format!("Client may not use grant type '{grant_type}'")),
        )
    }

    pub fn unsupported_grant_type(grant_type: &str) -> Self {
        Self::new(
            "unsupported_grant_type",
            Some(format!("Grant type '{grant_type}' is not served here")),
        )
    }

    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new("access_denied", Some(description.into()))
    }

    pub fn temporarily_unavailable(description: impl Into<String>) -> Self {
        Self::new("temporarily_unavailable", Some(description.into()))
    }

    pub fn server_error() -> Self {
        Self::new("server_error", None)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "invalid_token" | "invalid_client" | "access_denied" => StatusCode::UNAUTHORIZED,
            "insufficient_scope" => StatusCode::FORBIDDEN,
            "invalid_request" | "invalid_grant" | "unauthorized_client"
            | "unsupported_grant_type" => StatusCode::BAD_REQUEST,
            "temporarily_unavailable" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let challenge = match self.error.as_str() {
            "invalid_token" | "insufficient_scope" => {
                Some(format!("Bearer error=\"{}\"", self.error))
            }
            "invalid_client" => Some("Basic".to_string()),
            _ => None,
        };
        let mut response = (status, Json(self)).into_response();
        if let Some(value) = challenge.and_then(|c| HeaderValue::from_str(&c).ok()) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

impl From<AuthFlowError> for AuthError {
    fn from(e: AuthFlowError) -> Self {
        match e {
            AuthFlowError::Identity(gateway) if gateway.is_provider_unavailable() => {
                tracing::error!("GitHub unavailable: {}", gateway);
                AuthError::temporarily_unavailable("GitHub could not be reached")
            }
            AuthFlowError::Identity(gateway) => {
                tracing::info!("GitHub authentication failed: {}", gateway);
                AuthError::access_denied(gateway.to_string())
            }
            AuthFlowError::Persistence(db) => {
                tracing::error!("User store failure: {}", db);
                AuthError::server_error()
            }
            AuthFlowError::Token(token) => {
                tracing::error!("Token issuance failed: {}", token);
                AuthError::server_error()
            }
        }
    }
}

/// Extract the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(value) => value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AuthError::invalid_token("Authorization header must use Bearer scheme")
            }),
        None => Err(AuthError::invalid_token("Missing Authorization header")),
    }
}

/// Validate the bearer token of a request and require `ROLE_USER`.
pub async fn authenticate_request(
    resources: &AppResources,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(headers)?;
    let claims = resources.tokens.authenticate(token).await.map_err(|e| match e {
        TokenError::Database(db) => {
            tracing::error!("Database error looking up token: {}", db);
            AuthError::server_error()
        }
        other => AuthError::invalid_token(other.to_string()),
    })?;

    if !claims.has_authority(ROLE_USER) {
        return Err(AuthError::insufficient_scope(ROLE_USER));
    }
    Ok(claims.into())
}

/// Axum extractor for the authenticated user.
///
/// Uses the identity the request policy already validated; falls back to
/// validating the bearer token itself when mounted outside the policy.
///
/// ```ignore
/// async fn handler(BearerAuth(user): BearerAuth) -> impl IntoResponse {
///     format!("Hello, {}", user.email)
/// }
/// ```
pub struct BearerAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(BearerAuth(user.clone()));
        }

        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AuthError::server_error()
            })?;

        authenticate_request(&resources, &parts.headers)
            .await
            .map(BearerAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn test_auth_error_status_codes() {
        let response = AuthError::invalid_token("test").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let response = AuthError::insufficient_scope(ROLE_USER).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::invalid_client().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::invalid_grant("test").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AuthError::unsupported_grant_type("password").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AuthError::temporarily_unavailable("test").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = AuthError::server_error().into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_flow_error_mapping() {
        let rejected = AuthFlowError::Identity(GatewayError::Rejected {
            error: "bad_verification_code".into(),
            description: None,
        });
        assert_eq!(AuthError::from(rejected).error, "access_denied");

        let timeout =
            AuthFlowError::Identity(GatewayError::Timeout(std::time::Duration::from_secs(10)));
        assert_eq!(AuthError::from(timeout).error, "temporarily_unavailable");

        let db = AuthFlowError::Persistence(sea_orm::DbErr::Custom("boom".into()));
        assert_eq!(AuthError::from(db).error, "server_error");
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn test_authenticated_user_has_authority() {
        let user = AuthenticatedUser {
            email: "test@example.com".to_string(),
            authorities: vec![ROLE_USER.to_string()],
            client_id: "cvmaker".to_string(),
            scopes: vec!["read".to_string(), "write".to_string()],
            token_id: "jti".to_string(),
        };

        assert!(user.has_authority(ROLE_USER));
        assert!(!user.has_authority("ROLE_ADMIN"));
    }
}
