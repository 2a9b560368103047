//! Token issuer.
//!
//! Access and refresh tokens are signed JWTs. Every issued pair is recorded
//! in the `oauth2_token` table so refresh tokens can be rotated and grants
//! revoked before they expire.

use crate::config::{OAuth2Config, SigningAlgorithm, SigningConfig};
use crate::entity::{app_user, oauth2_token};
use crate::error::TokenError;
use crate::oauth2::client::{ClientRegistration, ROLE_USER};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use utoipa::ToSchema;

pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// The authenticated identity a token is issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub authorities: Vec<String>,
}

impl Principal {
    /// Principal for a regular application user.
    pub fn user(user: &app_user::Model) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            authorities: vec![ROLE_USER.to_string()],
        }
    }
}

/// Claims carried by both access and refresh tokens.
///
/// Refresh tokens additionally carry `ati`, the id of the access token they
/// were issued with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_name: String,
    pub authorities: Vec<String>,
    pub client_id: String,
    pub scope: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ati: Option<String>,
}

impl TokenClaims {
    pub fn is_refresh_token(&self) -> bool {
        self.ati.is_some()
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

/// Token response returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub scope: String,
    /// Id of the access token
    pub jti: String,
}

#[derive(Clone)]
struct SigningKeys {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_config(config: &SigningConfig) -> Result<Self, TokenError> {
        match config.algorithm {
            SigningAlgorithm::HS256 => {
                let signing = hex::decode(config.signing_key.trim())
                    .map_err(|e| TokenError::Key(format!("signing_key: {e}")))?;
                let verifier = hex::decode(config.verifier_key.trim())
                    .map_err(|e| TokenError::Key(format!("verifier_key: {e}")))?;
                Ok(Self {
                    algorithm: Algorithm::HS256,
                    encoding: EncodingKey::from_secret(&signing),
                    decoding: DecodingKey::from_secret(&verifier),
                })
            }
            SigningAlgorithm::RS256 => Ok(Self {
                algorithm: Algorithm::RS256,
                encoding: EncodingKey::from_rsa_pem(config.signing_key.as_bytes())
                    .map_err(|e| TokenError::Key(format!("signing_key: {e}")))?,
                decoding: DecodingKey::from_rsa_pem(config.verifier_key.as_bytes())
                    .map_err(|e| TokenError::Key(format!("verifier_key: {e}")))?,
            }),
        }
    }
}

struct MintedGrant {
    token: AccessToken,
    record: oauth2_token::ActiveModel,
}

#[derive(Clone)]
pub struct TokenIssuer {
    db: Arc<DatabaseConnection>,
    keys: SigningKeys,
    access_token_lifetime: i64,
    refresh_token_lifetime: i64,
}

impl TokenIssuer {
    pub fn new(db: Arc<DatabaseConnection>, config: &OAuth2Config) -> Result<Self, TokenError> {
        Ok(Self {
            db,
            keys: SigningKeys::from_config(&config.signing)?,
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
        })
    }

    /// Mint an access/refresh token pair for `principal` and record the grant.
    #[tracing::instrument(skip_all, fields(user_id = %principal.user_id, client_id = %client.client_id))]
    pub async fn create_access_token(
        &self,
        principal: &Principal,
        client: &ClientRegistration,
    ) -> Result<AccessToken, TokenError> {
        let minted = self.mint(principal, &client.client_id, &client.scopes)?;
        minted.record.insert(self.db.as_ref()).await?;
        tracing::info!(jti = %minted.token.jti, "Issued access token");
        Ok(minted.token)
    }

    fn mint(
        &self,
        principal: &Principal,
        client_id: &str,
        scopes: &[String],
    ) -> Result<MintedGrant, TokenError> {
        let now = OffsetDateTime::now_utc();
        let iat = now.unix_timestamp();
        let access_id = uuid::Uuid::new_v4().to_string();
        let refresh_id = uuid::Uuid::new_v4().to_string();

        let access_claims = TokenClaims {
            user_name: principal.email.clone(),
            authorities: principal.authorities.clone(),
            client_id: client_id.to_string(),
            scope: scopes.to_vec(),
            jti: access_id.clone(),
            iat,
            exp: iat + self.access_token_lifetime,
            ati: None,
        };
        let refresh_claims = TokenClaims {
            jti: refresh_id.clone(),
            exp: iat + self.refresh_token_lifetime,
            ati: Some(access_id.clone()),
            ..access_claims.clone()
        };

        let header = Header::new(self.keys.algorithm);
        let access_token =
            encode(&header, &access_claims, &self.keys.encoding).map_err(TokenError::Encoding)?;
        let refresh_token =
            encode(&header, &refresh_claims, &self.keys.encoding).map_err(TokenError::Encoding)?;

        let scope = scopes.join(" ");
        let record = oauth2_token::ActiveModel {
            id: Set(access_id.clone()),
            refresh_token_id: Set(refresh_id),
            user_id: Set(principal.user_id.clone()),
            client_id: Set(client_id.to_string()),
            scope: Set(scope.clone()),
            access_token_expires_at: Set(now + time::Duration::seconds(self.access_token_lifetime)),
            refresh_token_expires_at: Set(
                now + time::Duration::seconds(self.refresh_token_lifetime)
            ),
            created_at: Set(now),
            revoked_at: Set(None),
        };

        Ok(MintedGrant {
            token: AccessToken {
                access_token,
                token_type: TOKEN_TYPE_BEARER.to_string(),
                refresh_token,
                expires_in: self.access_token_lifetime,
                scope,
                jti: access_id,
            },
            record,
        })
    }

    fn decode_claims(&self, token: &str, validate_exp: bool) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(self.keys.algorithm);
        // Expired means expired; no clock skew allowance.
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        if !validate_exp {
            validation.required_spec_claims.clear();
        }
        let data = decode::<TokenClaims>(token, &self.keys.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Check signature and expiry of an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.decode_claims(token, true)?;
        if claims.is_refresh_token() {
            return Err(TokenError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Verify an access token and make sure its grant is still active.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let claims = self.verify_access_token(token)?;
        let grant = oauth2_token::Entity::find_by_id(claims.jti.clone())
            .one(self.db.as_ref())
            .await?
            .ok_or(TokenError::NotFound)?;
        if grant.is_revoked() {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new token pair. The old grant is
    /// revoked, so each refresh token is usable once.
    #[tracing::instrument(skip_all, fields(client_id = %client.client_id))]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientRegistration,
    ) -> Result<AccessToken, TokenError> {
        let claims = self.decode_claims(refresh_token, true)?;
        if !claims.is_refresh_token() {
            return Err(TokenError::WrongTokenType);
        }
        if claims.client_id != client.client_id {
            return Err(TokenError::ClientMismatch);
        }

        let txn = self.db.begin().await?;
        let grant = oauth2_token::Entity::find()
            .filter(oauth2_token::Column::RefreshTokenId.eq(claims.jti.as_str()))
            .one(&txn)
            .await?
            .ok_or(TokenError::NotFound)?;

        if grant.client_id != client.client_id {
            return Err(TokenError::ClientMismatch);
        }
        if grant.is_revoked() {
            tracing::warn!(grant_id = %grant.id, "Refresh token reuse detected");
            return Err(TokenError::Revoked);
        }
        if grant.is_refresh_token_expired() {
            return Err(TokenError::Expired);
        }

        // Conditional update so two concurrent refreshes cannot both rotate.
        let revoked = oauth2_token::Entity::update_many()
            .col_expr(
                oauth2_token::Column::RevokedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(oauth2_token::Column::Id.eq(grant.id.as_str()))
            .filter(oauth2_token::Column::RevokedAt.is_null())
            .exec(&txn)
            .await?;
        if revoked.rows_affected == 0 {
            return Err(TokenError::Revoked);
        }

        let principal = Principal {
            user_id: grant.user_id.clone(),
            email: claims.user_name,
            authorities: claims.authorities,
        };
        let minted = self.mint(&principal, &client.client_id, &grant.scopes_list())?;
        minted.record.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(old = %grant.id, new = %minted.token.jti, "Rotated refresh token");
        Ok(minted.token)
    }

    /// Revoke the grant an access or refresh token belongs to.
    ///
    /// Returns `false` when there was nothing to revoke for this client.
    #[tracing::instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str, client_id: &str) -> Result<bool, TokenError> {
        let claims = self.decode_claims(token, false)?;
        let grant_id = claims.ati.unwrap_or(claims.jti);
        let result = oauth2_token::Entity::update_many()
            .col_expr(
                oauth2_token::Column::RevokedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(oauth2_token::Column::Id.eq(grant_id.as_str()))
            .filter(oauth2_token::Column::ClientId.eq(client_id))
            .filter(oauth2_token::Column::RevokedAt.is_null())
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(grant_id = %grant_id, "Revoked token grant");
        }
        Ok(result.rows_affected > 0)
    }

    /// Delete grants whose refresh token has expired.
    pub async fn purge_expired(&self) -> Result<u64, TokenError> {
        let result = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::RefreshTokenExpiresAt.lt(OffsetDateTime::now_utc()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}

/// Periodically remove grants that can no longer be refreshed.
pub fn spawn_purge_task(issuer: TokenIssuer) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            match issuer.purge_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Purged expired token grants"),
                Err(e) => tracing::error!("Failed to purge expired token grants: {}", e),
            }
        }
    });
}
