//! GitHub identity gateway.
//!
//! Exchanges a GitHub OAuth authorization code for a GitHub access token and
//! reads the account's verified email address with it.

use crate::config::GitHubConfig;
use crate::error::GatewayError;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("cvmaker-auth/", env!("CARGO_PKG_VERSION"));

/// Request-scoped state of one code exchange.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExchangeContext {
    authorization_code: Option<String>,
    redirect_uri: Option<String>,
}

impl ExchangeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authorization_code(
        &mut self,
        authorization_code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) {
        self.authorization_code = Some(authorization_code.into());
        self.redirect_uri = Some(redirect_uri.into());
    }

    pub fn authorization_code(&self) -> Option<&str> {
        self.authorization_code.as_deref()
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }
}

/// GitHub answers the token exchange with `200 OK` in both the success and
/// the error case, so both shapes are optional here.
#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Pick the primary verified address, falling back to any verified one.
pub fn select_email(emails: &[GitHubEmail]) -> Option<&str> {
    emails
        .iter()
        .find(|e| e.primary && e.verified)
        .or_else(|| emails.iter().find(|e| e.verified))
        .map(|e| e.email.as_str())
}

#[derive(Clone)]
pub struct GitHubGateway {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    api_url: String,
    timeout: Duration,
}

impl GitHubGateway {
    pub fn new(config: &GitHubConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Perform the code exchange described by `context` and return the
    /// authenticated account's email.
    #[tracing::instrument(skip_all, fields(redirect_uri = context.redirect_uri()))]
    pub async fn authenticated_email(
        &self,
        context: &ExchangeContext,
    ) -> Result<String, GatewayError> {
        let code = context
            .authorization_code()
            .ok_or(GatewayError::MissingAuthorizationCode)?;
        let provider_token = self.exchange_code(code, context.redirect_uri()).await?;
        self.verified_email(&provider_token).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];
        if let Some(uri) = redirect_uri.filter(|u| !u.is_empty()) {
            form.push(("redirect_uri", uri));
        }

        let response = self
            .http
            .post(&self.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status,
                context: "code exchange".to_string(),
            });
        }

        let body: CodeExchangeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidJson(e.to_string()))?;

        match body {
            CodeExchangeResponse {
                access_token: Some(token),
                ..
            } => Ok(token),
            CodeExchangeResponse {
                error,
                error_description,
                ..
            } => {
                let error = error.unwrap_or_else(|| "missing_access_token".to_string());
                tracing::warn!(error = %error, "GitHub rejected authorization code");
                Err(GatewayError::Rejected {
                    error,
                    description: error_description,
                })
            }
        }
    }

    async fn verified_email(&self, provider_token: &str) -> Result<String, GatewayError> {
        let response = self
            .http
            .get(format!("{}/user/emails", self.api_url))
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {provider_token}"))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Http {
                status,
                context: "fetching user emails".to_string(),
            });
        }

        let emails: Vec<GitHubEmail> = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidJson(e.to_string()))?;

        select_email(&emails)
            .map(str::to_string)
            .ok_or(GatewayError::NoVerifiedEmail)
    }

    fn transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}
