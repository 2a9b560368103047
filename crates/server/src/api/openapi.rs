//! OpenAPI/Utoipa configuration.

use crate::api::{account::ACCOUNT_TAG, github::AUTH_TAG, health::MISC_TAG};
use crate::oauth2::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Access token obtained from `/auth/github` or `/oauth/token`.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let client = HttpBuilder::new()
                .scheme(HttpAuthScheme::Basic)
                .description(Some("Registered OAuth2 client id and secret."))
                .build();
            components.add_security_scheme("client_auth", SecurityScheme::Http(client));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "CV Maker Auth API",
        version = "1.0.0",
        description = "OAuth2 authorization server with GitHub login."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = AUTH_TAG, description = "Third-party login"),
        (name = OAUTH2_TAG, description = "OAuth2 token endpoints"),
        (name = ACCOUNT_TAG, description = "Authenticated account")
    )
)]
pub struct ApiDoc;
