use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        error::AuthError,
        federated::FederatedProfile,
        repo::UserStore,
        repo_types::{InsertOutcome, NewUser, User},
    },
    config::AccountLinking,
};

/// Emails are compared trimmed and lower-cased everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Maps verified credentials to the canonical user row.
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    linking: AccountLinking,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>, linking: AccountLinking) -> Self {
        Self { users, linking }
    }

    pub fn store(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Restores the user a session is bound to.
    pub async fn find_by_id(&self, id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound(id))
    }

    /// Inserts a password account. The unique constraint on `email` decides
    /// duplicates, whatever any earlier existence check said.
    #[instrument(skip(self, first_name, last_name, password_hash))]
    pub async fn create_local(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
        password_hash: String,
    ) -> Result<User, AuthError> {
        let outcome = self
            .users
            .insert(NewUser {
                email: normalize_email(email),
                password_hash: Some(password_hash),
                federated_id: None,
                first_name: first_name.trim().to_string(),
                last_name: last_name.trim().to_string(),
                profile_picture_url: None,
            })
            .await?;
        match outcome {
            InsertOutcome::Created(user) => {
                info!(user_id = %user.id, "local user created");
                Ok(user)
            }
            InsertOutcome::Conflict(field) => {
                warn!(?field, "signup lost to unique constraint");
                Err(AuthError::DuplicateEmail)
            }
        }
    }

    /// Resolves a provider-verified profile, creating a row on first login.
    #[instrument(skip(self, profile), fields(provider_id = %profile.provider_id))]
    pub async fn resolve_federated(&self, profile: &FederatedProfile) -> Result<User, AuthError> {
        profile.validate()?;
        let email = normalize_email(&profile.email);

        if let Some(user) = self.lookup_existing(&profile.provider_id, &email).await? {
            return Ok(user);
        }

        let outcome = self
            .users
            .insert(NewUser {
                email: email.clone(),
                password_hash: None,
                federated_id: Some(profile.provider_id.clone()),
                first_name: profile.first_name.clone(),
                last_name: profile.last_name.clone(),
                profile_picture_url: profile.picture_url.clone(),
            })
            .await?;

        match outcome {
            InsertOutcome::Created(user) => {
                info!(user_id = %user.id, "federated user created");
                Ok(user)
            }
            InsertOutcome::Conflict(field) => {
                // A concurrent login or signup created the row first.
                debug!(?field, "federated insert raced, re-resolving");
                self.lookup_existing(&profile.provider_id, &email)
                    .await?
                    .ok_or_else(|| {
                        AuthError::System(anyhow::anyhow!(
                            "federated insert conflicted on {field:?} but no row resolves"
                        ))
                    })
            }
        }
    }

    async fn lookup_existing(
        &self,
        provider_id: &str,
        email: &str,
    ) -> Result<Option<User>, AuthError> {
        if let Some(user) = self.users.find_by_federated_id(provider_id).await? {
            debug!(user_id = %user.id, "resolved by federated id");
            return Ok(Some(user));
        }
        match self.users.find_by_email(email).await? {
            Some(user) => Ok(Some(self.link(user, provider_id).await?)),
            None => Ok(None),
        }
    }

    async fn link(&self, user: User, provider_id: &str) -> Result<User, AuthError> {
        match (self.linking, user.federated_id.as_deref()) {
            (AccountLinking::Reuse, _) => {
                debug!(user_id = %user.id, "reusing existing row without linking");
                Ok(user)
            }
            (AccountLinking::Attach, None) => {
                match self.users.attach_federated_id(user.id, provider_id).await? {
                    Some(linked) => {
                        info!(user_id = %linked.id, "federated id linked to existing account");
                        Ok(linked)
                    }
                    None => Ok(user),
                }
            }
            (AccountLinking::Attach, Some(existing)) => {
                if existing != provider_id {
                    warn!(user_id = %user.id, "email already linked to a different provider account");
                }
                Ok(user)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryUserStore;

    fn profile(provider_id: &str, email: &str) -> FederatedProfile {
        FederatedProfile {
            provider_id: provider_id.into(),
            email: email.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            picture_url: Some("https://example.com/ada.png".into()),
            email_verified: true,
        }
    }

    fn resolver(linking: AccountLinking) -> (Arc<MemoryUserStore>, IdentityResolver) {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(store.clone(), linking);
        (store, resolver)
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[tokio::test]
    async fn first_federated_login_creates_row() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let user = resolver.resolve_federated(&profile("g-1", "new@example.com")).await.unwrap();
        assert_eq!(user.federated_id.as_deref(), Some("g-1"));
        assert!(user.password_hash.is_none());
        assert_eq!(user.profile_picture_url.as_deref(), Some("https://example.com/ada.png"));
        assert_eq!(store.len(), 1);

        let again = resolver.resolve_federated(&profile("g-1", "new@example.com")).await.unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn reuse_policy_leaves_local_row_unlinked() {
        let (store, resolver) = resolver(AccountLinking::Reuse);
        let local = resolver
            .create_local("ada@example.com", "Ada", "Lovelace", "$argon2id$stub".into())
            .await
            .unwrap();

        let user = resolver.resolve_federated(&profile("g-42", "ada@example.com")).await.unwrap();
        assert_eq!(user.id, local.id);
        assert!(user.federated_id.is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn attach_policy_links_local_row() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let local = resolver
            .create_local("ada@example.com", "Ada", "Lovelace", "$argon2id$stub".into())
            .await
            .unwrap();

        let user = resolver.resolve_federated(&profile("g-42", "ADA@example.com")).await.unwrap();
        assert_eq!(user.id, local.id);
        assert_eq!(user.federated_id.as_deref(), Some("g-42"));
        assert!(user.password_hash.is_some());

        let by_id = store.find_by_federated_id("g-42").await.unwrap().unwrap();
        assert_eq!(by_id.id, local.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn attach_never_overwrites_existing_federated_id() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let first = resolver.resolve_federated(&profile("g-1", "ada@example.com")).await.unwrap();
        let second = resolver.resolve_federated(&profile("g-2", "ada@example.com")).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.federated_id.as_deref(), Some("g-1"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn malformed_profile_fails_before_store_access() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        store.set_unavailable(true);
        let err = resolver.resolve_federated(&profile("g-1", "  ")).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedFederatedProfile(_)));
        let err = resolver.resolve_federated(&profile("", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedFederatedProfile(_)));
        store.set_unavailable(false);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn unverified_email_never_claims_existing_account() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let victim = resolver
            .create_local("victim@example.com", "Vic", "Tim", "$argon2id$stub".into())
            .await
            .unwrap();

        let forged = FederatedProfile {
            email_verified: false,
            ..profile("attacker-sub", "victim@example.com")
        };
        let err = resolver.resolve_federated(&forged).await.unwrap_err();
        assert!(matches!(err, AuthError::UnverifiedFederatedEmail));
        assert!(err.is_recoverable());

        let stored = store.find_by_id(victim.id).await.unwrap().unwrap();
        assert!(stored.federated_id.is_none());
        assert!(store.find_by_federated_id("attacker-sub").await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_system_error() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        store.set_unavailable(true);
        let err = resolver.resolve_federated(&profile("g-1", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::System(_)));
    }

    #[tokio::test]
    async fn concurrent_first_logins_converge_on_one_row() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve_federated(&profile("g-9", "race@example.com")).await
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn find_by_id_reports_vanished_identity() {
        let (store, resolver) = resolver(AccountLinking::Attach);
        let user = resolver.resolve_federated(&profile("g-1", "a@example.com")).await.unwrap();
        store.remove(user.id);
        let err = resolver.find_by_id(user.id).await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityNotFound(id) if id == user.id));
    }
}
