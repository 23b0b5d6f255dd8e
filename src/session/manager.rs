use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::session::{
    store::{SessionRecord, SessionStore, Slot},
    token::SessionKeys,
};

/// Session lifecycle: issue, restore, rotate on login, tear down on logout.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    keys: SessionKeys,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, keys: SessionKeys) -> Self {
        Self { store, keys }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Loads the record named by a verified cookie. Missing and expired
    /// records both come back as `None`.
    pub async fn restore(&self, sid: Option<Uuid>) -> anyhow::Result<Option<SessionRecord>> {
        let Some(sid) = sid else {
            return Ok(None);
        };
        let record = self.store.load(sid).await?;
        if record.is_none() {
            debug!(%sid, "session cookie refers to unknown or expired session");
        }
        Ok(record)
    }

    /// Every visitor gets a session, authenticated or not.
    pub async fn start_anonymous(&self) -> anyhow::Result<SessionRecord> {
        let record = SessionRecord::new(None, self.keys.ttl());
        self.store.create(&record).await?;
        debug!(sid = %record.id, "anonymous session started");
        Ok(record)
    }

    /// Binds `user_id` to a fresh session id and returns the cookie to set.
    /// The previous session is dropped so a pre-login id never gains rights.
    pub async fn establish(
        &self,
        previous: Option<Uuid>,
        user_id: Uuid,
    ) -> anyhow::Result<HeaderValue> {
        if let Some(old) = previous {
            if let Err(e) = self.store.destroy(old).await {
                warn!(error = %e, sid = %old, "failed to drop pre-login session");
            }
        }
        let record = SessionRecord::new(Some(user_id), self.keys.ttl());
        self.store.create(&record).await?;
        info!(sid = %record.id, %user_id, "session established");
        self.keys.set_cookie(record.id)
    }

    /// Destroys the server record, then hands back the clearing cookie. A
    /// store failure is logged and does not stop the client-side teardown.
    pub async fn teardown(&self, sid: Uuid) -> HeaderValue {
        match self.store.destroy(sid).await {
            Ok(()) => info!(%sid, "session destroyed"),
            Err(e) => warn!(error = %e, %sid, "session destroy failed, clearing cookie anyway"),
        }
        self.keys.clear_cookie()
    }

    /// Drops a user binding that no longer resolves.
    pub async fn unbind(&self, sid: Uuid) -> anyhow::Result<()> {
        self.store.set_user(sid, None).await
    }

    pub async fn flash(&self, sid: Uuid, message: &str) {
        if let Err(e) = self.store.put(sid, Slot::Flash, message).await {
            warn!(error = %e, %sid, "failed to store flash message");
        }
    }

    pub async fn take_flash(&self, sid: Uuid) -> Option<String> {
        match self.store.take(sid, Slot::Flash).await {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, %sid, "failed to read flash message");
                None
            }
        }
    }

    pub async fn remember_oauth_state(&self, sid: Uuid, state: &str) -> anyhow::Result<()> {
        self.store.put(sid, Slot::OAuthState, state).await
    }

    pub async fn take_oauth_state(&self, sid: Uuid) -> anyhow::Result<Option<String>> {
        self.store.take(sid, Slot::OAuthState).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SessionConfig, session::store::memory::MemorySessionStore};

    fn manager() -> (Arc<MemorySessionStore>, SessionManager) {
        let store = Arc::new(MemorySessionStore::new());
        let keys = SessionKeys::new(&SessionConfig {
            secret: "test-secret".into(),
            cookie_name: "carepoint.sid".into(),
            ttl_hours: 24,
            secure_cookie: false,
        });
        (store.clone(), SessionManager::new(store, keys))
    }

    fn sid_from_cookie(manager: &SessionManager, cookie: &HeaderValue) -> Uuid {
        let raw = cookie.to_str().unwrap();
        let token = raw
            .split(';')
            .next()
            .and_then(|kv| kv.split_once('='))
            .map(|(_, v)| v)
            .unwrap();
        manager.keys().verify(token).unwrap()
    }

    #[tokio::test]
    async fn establish_rotates_session_id() {
        let (store, manager) = manager();
        let anon = manager.start_anonymous().await.unwrap();
        let user_id = Uuid::new_v4();
        let cookie = manager.establish(Some(anon.id), user_id).await.unwrap();
        let sid = sid_from_cookie(&manager, &cookie);

        assert_ne!(sid, anon.id);
        assert!(store.get(anon.id).is_none());
        assert_eq!(store.get(sid).unwrap().user_id, Some(user_id));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn teardown_invalidates_record() {
        let (_, manager) = manager();
        let cookie = manager.establish(None, Uuid::new_v4()).await.unwrap();
        let sid = sid_from_cookie(&manager, &cookie);

        let cleared = manager.teardown(sid).await;
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
        assert!(manager.restore(Some(sid)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn teardown_clears_cookie_even_when_store_fails() {
        let (store, manager) = manager();
        let cookie = manager.establish(None, Uuid::new_v4()).await.unwrap();
        let sid = sid_from_cookie(&manager, &cookie);
        store.set_fail_destroy(true);
        let cleared = manager.teardown(sid).await;
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn oauth_state_is_single_use() {
        let (_, manager) = manager();
        let anon = manager.start_anonymous().await.unwrap();
        manager.remember_oauth_state(anon.id, "xyz").await.unwrap();
        assert_eq!(manager.take_oauth_state(anon.id).await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(manager.take_oauth_state(anon.id).await.unwrap(), None);
    }
}
