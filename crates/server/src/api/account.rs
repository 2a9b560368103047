//! Endpoints about the authenticated account.

use crate::api::auth::{AuthError, BearerAuth};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const ACCOUNT_TAG: &str = "Account";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalResponse {
    pub email: String,
    pub authorities: Vec<String>,
    pub client_id: String,
    pub scope: Vec<String>,
}

/// Creates the account router (mounted under `/api`).
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(me))
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/me",
    tag = ACCOUNT_TAG,
    operation_id = "Current Principal",
    summary = "Return the principal of the presented access token",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Authenticated principal", body = PrincipalResponse),
        (status = 401, description = "Missing, invalid, expired or revoked token", body = AuthError),
    )
)]
pub async fn me(BearerAuth(user): BearerAuth) -> Json<PrincipalResponse> {
    Json(PrincipalResponse {
        email: user.email,
        authorities: user.authorities,
        client_id: user.client_id,
        scope: user.scopes,
    })
}
