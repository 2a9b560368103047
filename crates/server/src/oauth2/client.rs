//! The statically registered OAuth2 client.

use crate::config::OAuth2Config;

pub const GRANT_PASSWORD: &str = "password";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// Authority granted to every authenticated user.
pub const ROLE_USER: &str = "ROLE_USER";

/// Grant types this server knows about at all.
pub const KNOWN_GRANT_TYPES: [&str; 3] =
    [GRANT_PASSWORD, GRANT_REFRESH_TOKEN, GRANT_AUTHORIZATION_CODE];

/// Client credentials and capabilities, fixed for the process lifetime.
#[derive(Clone)]
pub struct ClientRegistration {
    pub client_id: String,
    client_secret: String,
    pub grant_types: Vec<String>,
    pub scopes: Vec<String>,
    pub authorities: Vec<String>,
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("grant_types", &self.grant_types)
            .field("scopes", &self.scopes)
            .field("authorities", &self.authorities)
            .finish_non_exhaustive()
    }
}

impl ClientRegistration {
    pub fn from_config(config: &OAuth2Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            grant_types: KNOWN_GRANT_TYPES.iter().map(|g| g.to_string()).collect(),
            scopes: vec!["read".to_string(), "write".to_string()],
            authorities: vec![ROLE_USER.to_string()],
        }
    }

    /// Check presented client credentials.
    pub fn authenticate(&self, client_id: &str, client_secret: Option<&str>) -> bool {
        let secret_matches = client_secret.is_some_and(|secret| {
            constant_time_eq(secret.as_bytes(), self.client_secret.as_bytes())
        });
        client_id == self.client_id && secret_matches
    }

    /// Whether the client registration allows the given grant type.
    pub fn supports_grant(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Scopes as the space separated string used on the wire.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SigningAlgorithm, SigningConfig};

    fn registration() -> ClientRegistration {
        ClientRegistration::from_config(&OAuth2Config {
            client_id: "cvmaker".into(),
            client_secret: "s3cret".into(),
            access_token_lifetime: 60,
            refresh_token_lifetime: 120,
            signing: SigningConfig {
                algorithm: SigningAlgorithm::HS256,
                signing_key: String::new(),
                verifier_key: String::new(),
            },
        })
    }

    #[test]
    fn authenticate_requires_id_and_secret() {
        let client = registration();
        assert!(client.authenticate("cvmaker", Some("s3cret")));
        assert!(!client.authenticate("cvmaker", Some("wrong")));
        assert!(!client.authenticate("cvmaker", None));
        assert!(!client.authenticate("other", Some("s3cret")));
    }

    #[test]
    fn secret_comparison_checks_every_byte() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"x3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cre", b"s3cret"));
        assert!(constant_time_eq(b"", b""));

        let client = registration();
        assert!(!client.authenticate("cvmaker", Some("s3cre")));
        assert!(!client.authenticate("cvmaker", Some("s3crett")));
    }

    #[test]
    fn registered_grants_and_scopes() {
        let client = registration();
        assert!(client.supports_grant("password"));
        assert!(client.supports_grant("refresh_token"));
        assert!(client.supports_grant("authorization_code"));
        assert!(!client.supports_grant("client_credentials"));
        assert_eq!(client.scope_string(), "read write");
        assert_eq!(client.authorities, vec![ROLE_USER.to_string()]);
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", registration());
        assert!(rendered.contains("cvmaker"));
        assert!(!rendered.contains("s3cret"));
    }
}
