use reqwest::StatusCode;
use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No authorization code present in the exchange context")]
    MissingAuthorizationCode,
    #[error("GitHub rejected the authorization code: {error}")]
    Rejected {
        error: String,
        description: Option<String>,
    },
    #[error("HTTP {status} from GitHub: {context}")]
    Http { status: StatusCode, context: String },
    #[error("Timeout after {0:?} talking to GitHub")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
    #[error("GitHub account has no verified email address")]
    NoVerifiedEmail,
}

impl GatewayError {
    /// Whether the failure is on the provider side rather than caused by the
    /// presented credentials.
    pub fn is_provider_unavailable(&self) -> bool {
        match self {
            GatewayError::Timeout(_) | GatewayError::Network(_) => true,
            GatewayError::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Token has expired")]
    Expired,
    #[error("Token is not of the expected type")]
    WrongTokenType,
    #[error("Token grant not found")]
    NotFound,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Token was issued to a different client")]
    ClientMismatch,
    #[error("Invalid signing key: {0}")]
    Key(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

/// Failure of the GitHub login exchange as a whole.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Authentication with GitHub failed: {0}")]
    Identity(#[from] GatewayError),
    #[error("User store failure: {0}")]
    Persistence(#[from] DbErr),
    #[error("Token issuance failed: {0}")]
    Token(#[from] TokenError),
}
