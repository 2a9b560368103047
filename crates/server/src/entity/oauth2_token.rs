//! Issued token grants: one row per access/refresh token pair.
//!
//! The tokens themselves are self-contained JWTs and are never stored; the
//! row is keyed by the access token id (`jti`) and also records the refresh
//! token id so refresh rotation and revocation can be enforced.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub refresh_token_id: String,
    pub user_id: String,
    pub client_id: String,
    pub scope: String,
    pub access_token_expires_at: OffsetDateTime,
    pub refresh_token_expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::app_user::Entity",
        from = "Column::UserId",
        to = "super::app_user::Column::Id"
    )]
    User,
}

impl Related<super::app_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Check if the access token has expired
    pub fn is_access_token_expired(&self) -> bool {
        self.access_token_expires_at < OffsetDateTime::now_utc()
    }

    /// Check if the refresh token has expired
    pub fn is_refresh_token_expired(&self) -> bool {
        self.refresh_token_expires_at < OffsetDateTime::now_utc()
    }

    /// Check if this grant has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Parse scopes from space-separated string
    pub fn scopes_list(&self) -> Vec<String> {
        self.scope.split_whitespace().map(String::from).collect()
    }
}
