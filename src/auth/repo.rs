use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::auth::repo_types::{InsertOutcome, NewUser, UniqueField, User};

const USER_COLUMNS: &str = "id, email, password_hash, federated_id, first_name, last_name, \
                            profile_picture_url, created_at";

/// Durable user identities. Uniqueness of `email` and `federated_id` is
/// enforced by the store itself, never by callers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_federated_id(&self, federated_id: &str) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome>;
    /// Sets `federated_id` on a row that has none. Returns the updated row, or
    /// `None` when the row already carries a provider id or the id is taken.
    async fn attach_federated_id(
        &self,
        user_id: Uuid,
        federated_id: &str,
    ) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn unique_violation(err: &sqlx::Error) -> Option<UniqueField> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    match db_err.constraint() {
        Some("users_federated_id_key") => Some(UniqueField::FederatedId),
        _ => Some(UniqueField::Email),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("select user by email")?;
        Ok(user)
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE federated_id = $1"
        ))
        .bind(federated_id)
        .fetch_optional(&self.db)
        .await
        .context("select user by federated id")?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users
                (email, password_hash, federated_id, first_name, last_name, profile_picture_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.federated_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile_picture_url)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(created) => Ok(InsertOutcome::Created(created)),
            Err(e) => match unique_violation(&e) {
                Some(field) => Ok(InsertOutcome::Conflict(field)),
                None => Err(anyhow::Error::new(e).context("insert user")),
            },
        }
    }

    async fn attach_federated_id(
        &self,
        user_id: Uuid,
        federated_id: &str,
    ) -> anyhow::Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET federated_id = $2
            WHERE id = $1 AND federated_id IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(federated_id)
        .fetch_optional(&self.db)
        .await;

        match result {
            Ok(updated) => Ok(updated),
            Err(e) if unique_violation(&e).is_some() => {
                warn!(%user_id, "federated id already linked to another user");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("attach federated id")),
        }
    }
}
