use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Server-side session row. The cookie only carries (a signature over) `id`.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub oauth_state: Option<String>,
    pub flash: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn new(user_id: Option<Uuid>, ttl: time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            oauth_state: None,
            flash: None,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }
}

/// One-shot text slots kept on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    OAuthState,
    Flash,
}

impl Slot {
    fn column(self) -> &'static str {
        match self {
            Slot::OAuthState => "oauth_state",
            Slot::Flash => "flash",
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, record: &SessionRecord) -> anyhow::Result<()>;
    /// Returns the record unless it is missing or expired.
    async fn load(&self, id: Uuid) -> anyhow::Result<Option<SessionRecord>>;
    async fn set_user(&self, id: Uuid, user_id: Option<Uuid>) -> anyhow::Result<()>;
    async fn put(&self, id: Uuid, slot: Slot, value: &str) -> anyhow::Result<()>;
    /// Reads and clears a slot in one step.
    async fn take(&self, id: Uuid, slot: Slot) -> anyhow::Result<Option<String>>;
    async fn destroy(&self, id: Uuid) -> anyhow::Result<()>;
    async fn purge_expired(&self) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, record: &SessionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, oauth_state, flash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.oauth_state)
        .bind(&record.flash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.db)
        .await
        .context("insert session")?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> anyhow::Result<Option<SessionRecord>> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, oauth_state, flash, created_at, expires_at
            FROM sessions
            WHERE id = $1 AND expires_at > now()
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select session")?;
        Ok(record)
    }

    async fn set_user(&self, id: Uuid, user_id: Option<Uuid>) -> anyhow::Result<()> {
        sqlx::query("UPDATE sessions SET user_id = $2 WHERE id = $1")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("update session user")?;
        Ok(())
    }

    async fn put(&self, id: Uuid, slot: Slot, value: &str) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "UPDATE sessions SET {} = $2 WHERE id = $1",
            slot.column()
        ))
        .bind(id)
        .bind(value)
        .execute(&self.db)
        .await
        .with_context(|| format!("set session {}", slot.column()))?;
        Ok(())
    }

    async fn take(&self, id: Uuid, slot: Slot) -> anyhow::Result<Option<String>> {
        let column = slot.column();
        let value: Option<Option<String>> = sqlx::query_scalar(&format!(
            r#"
            UPDATE sessions s
            SET {column} = NULL
            FROM (SELECT id, {column} FROM sessions WHERE id = $1 FOR UPDATE) old
            WHERE s.id = old.id
            RETURNING old.{column}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("take session {column}"))?;
        Ok(value.flatten())
    }

    async fn destroy(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete session")?;
        Ok(())
    }

    async fn purge_expired(&self) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
            .execute(&self.db)
            .await
            .context("purge expired sessions")?;
        Ok(result.rows_affected())
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemorySessionStore;
    use super::*;

    #[tokio::test]
    async fn slots_are_read_once() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::new(None, time::Duration::hours(24));
        store.create(&record).await.unwrap();
        store.put(record.id, Slot::Flash, "hello").await.unwrap();
        assert_eq!(store.take(record.id, Slot::Flash).await.unwrap().as_deref(), Some("hello"));
        assert_eq!(store.take(record.id, Slot::Flash).await.unwrap(), None);
        assert_eq!(store.take(record.id, Slot::OAuthState).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_sessions_do_not_load_and_get_purged() {
        let store = MemorySessionStore::new();
        let live = SessionRecord::new(None, time::Duration::hours(24));
        let stale = SessionRecord::new(None, time::Duration::hours(24));
        store.create(&live).await.unwrap();
        store.create(&stale).await.unwrap();
        store.expire(stale.id);
        assert!(store.load(stale.id).await.unwrap().is_none());
        assert!(store.load(live.id).await.unwrap().is_some());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
