//! User store.
//!
//! Users are keyed by email. The first successful GitHub login for an email
//! creates the user; later logins resolve to the same row.

use crate::entity::app_user;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    sea_query::OnConflict,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Outcome of [`UserStore::find_or_create`].
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: app_user::Model,
    /// Whether this call inserted the row.
    pub created: bool,
}

#[derive(Clone)]
pub struct UserStore {
    db: Arc<DatabaseConnection>,
}

impl UserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<app_user::Model>, DbErr> {
        app_user::Entity::find()
            .filter(app_user::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
    }

    /// Look up the user for `email`, creating it when absent.
    ///
    /// The insert is `ON CONFLICT (email) DO NOTHING` followed by a read, so
    /// concurrent first logins for the same email converge on a single row
    /// without surfacing the uniqueness violation.
    #[tracing::instrument(skip(self))]
    pub async fn find_or_create(&self, email: &str) -> Result<ResolvedUser, DbErr> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(ResolvedUser {
                user,
                created: false,
            });
        }

        let candidate = app_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(email.to_string()),
            created_at: Set(OffsetDateTime::now_utc()),
        };
        let inserted = app_user::Entity::insert(candidate)
            .on_conflict(
                OnConflict::column(app_user::Column::Email)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        let user = self.find_by_email(email).await?.ok_or_else(|| {
            DbErr::RecordNotFound(format!("user for {email} missing after insert"))
        })?;

        if inserted > 0 {
            tracing::info!(user_id = %user.id, "Created user");
        } else {
            tracing::debug!(user_id = %user.id, "User created concurrently, reusing it");
        }

        Ok(ResolvedUser {
            user,
            created: inserted > 0,
        })
    }
}
