use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::{
    error::AuthError,
    password::{hash_password, verify_password},
    repo::UserStore,
    repo_types::User,
    resolver::{normalize_email, IdentityResolver},
};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Fields collected by the signup form.
pub struct SignupInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl SignupInput {
    fn validate(&self) -> Result<(), AuthError> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(AuthError::InvalidSignup("First and last name are required.".into()));
        }
        if !is_valid_email(&normalize_email(&self.email)) {
            return Err(AuthError::InvalidSignup("Please enter a valid email address.".into()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidSignup(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        Ok(())
    }
}

/// Email + password verification against the credential store.
#[derive(Clone)]
pub struct LocalStrategy {
    resolver: IdentityResolver,
}

impl LocalStrategy {
    pub fn new(resolver: IdentityResolver) -> Self {
        Self { resolver }
    }

    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.resolver.store().find_by_email(&email).await? else {
            warn!("login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let Some(hash) = user.password_hash.clone() else {
            warn!(user_id = %user.id, "password login on federated-only account");
            return Err(AuthError::AccountProviderMismatch);
        };

        if !verify_password(password.to_string(), hash).await {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    #[instrument(skip(self, input), fields(email = %normalize_email(&input.email)))]
    pub async fn signup(&self, input: SignupInput) -> Result<User, AuthError> {
        input.validate()?;
        let email = normalize_email(&input.email);

        // Fast path only; the insert below is authoritative.
        if self.resolver.store().find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let hash = hash_password(input.password).await?;
        self.resolver
            .create_local(&email, &input.first_name, &input.last_name, hash)
            .await
    }
}
