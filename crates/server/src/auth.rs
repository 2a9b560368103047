//! GitHub login: exchange a GitHub authorization code for an access token
//! issued by this server.

use crate::error::AuthFlowError;
use crate::github::{ExchangeContext, GitHubGateway};
use crate::oauth2::client::ClientRegistration;
use crate::oauth2::identity::UserStore;
use crate::oauth2::token::{AccessToken, Principal, TokenIssuer};

#[derive(Clone)]
pub struct AuthService {
    gateway: GitHubGateway,
    users: UserStore,
    tokens: TokenIssuer,
    client: ClientRegistration,
}

impl AuthService {
    pub fn new(
        gateway: GitHubGateway,
        users: UserStore,
        tokens: TokenIssuer,
        client: ClientRegistration,
    ) -> Self {
        Self {
            gateway,
            users,
            tokens,
            client,
        }
    }

    /// Authenticate the GitHub user behind `authorization_code`, create the
    /// local user on first login and issue a token for it.
    ///
    /// An empty code leaves the exchange context empty; the gateway then
    /// fails with [`GatewayError::MissingAuthorizationCode`].
    ///
    /// [`GatewayError::MissingAuthorizationCode`]: crate::error::GatewayError::MissingAuthorizationCode
    #[tracing::instrument(skip_all, fields(redirect_uri = %redirect_uri))]
    pub async fn authorize_github_user(
        &self,
        authorization_code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, AuthFlowError> {
        tracing::info!(
            has_code = !authorization_code.is_empty(),
            "Starting GitHub authorization"
        );

        let mut context = ExchangeContext::new();
        if !authorization_code.is_empty() {
            context.set_authorization_code(authorization_code, redirect_uri);
        }

        let email = self.gateway.authenticated_email(&context).await?;
        let resolved = self.users.find_or_create(&email).await?;
        if resolved.created {
            tracing::info!(user_id = %resolved.user.id, "First login, user created");
        }

        let principal = Principal::user(&resolved.user);
        let token = self
            .tokens
            .create_access_token(&principal, &self.client)
            .await?;
        Ok(token)
    }
}
