//! In-memory user store for tests. Applies the same uniqueness rules as the
//! `users` table under a single lock, so concurrent inserts race the way
//! they would against Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{InsertOutcome, NewUser, UniqueField, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    unavailable: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Makes every call fail, simulating an unreachable database.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Drops a row behind the application's back.
    pub fn remove(&self, id: Uuid) {
        self.users.lock().unwrap().remove(&id);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users.lock().unwrap().values().find(|u| pred(u)).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_federated_id(&self, federated_id: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.find(|u| u.federated_id.as_deref() == Some(federated_id)))
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<InsertOutcome> {
        self.check()?;
        anyhow::ensure!(
            user.password_hash.is_some() || user.federated_id.is_some(),
            "users_credential_check violated"
        );
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Ok(InsertOutcome::Conflict(UniqueField::Email));
        }
        if let Some(fid) = &user.federated_id {
            if users.values().any(|u| u.federated_id.as_ref() == Some(fid)) {
                return Ok(InsertOutcome::Conflict(UniqueField::FederatedId));
            }
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            federated_id: user.federated_id,
            first_name: user.first_name,
            last_name: user.last_name,
            profile_picture_url: user.profile_picture_url,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(created.id, created.clone());
        Ok(InsertOutcome::Created(created))
    }

    async fn attach_federated_id(
        &self,
        user_id: Uuid,
        federated_id: &str,
    ) -> anyhow::Result<Option<User>> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.federated_id.as_deref() == Some(federated_id))
        {
            return Ok(None);
        }
        match users.get_mut(&user_id) {
            Some(user) if user.federated_id.is_none() => {
                user.federated_id = Some(federated_id.to_string());
                Ok(Some(user.clone()))
            }
            _ => Ok(None),
        }
    }
}
