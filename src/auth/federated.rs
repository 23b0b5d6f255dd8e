use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

use crate::{auth::error::AuthError, config::GoogleConfig};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &[&str] = &["profile", "email"];

/// Profile vouched for by the provider after the code exchange.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub provider_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub picture_url: Option<String>,
    /// Whether the provider has confirmed the visitor owns `email`.
    pub email_verified: bool,
}

impl FederatedProfile {
    /// A profile without an id or a verified email must never reach the store.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.provider_id.trim().is_empty() {
            return Err(AuthError::MalformedFederatedProfile(
                "missing provider id".into(),
            ));
        }
        if self.email.trim().is_empty() {
            return Err(AuthError::MalformedFederatedProfile("missing email".into()));
        }
        if !self.email_verified {
            return Err(AuthError::UnverifiedFederatedEmail);
        }
        Ok(())
    }
}

/// Redirect-based authorization-code provider.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Consent URL the visitor is redirected to; `state` is echoed back on callback.
    fn authorize_url(&self, state: &str) -> anyhow::Result<String>;
    /// Trades an authorization code for the verified profile.
    async fn exchange(&self, code: &str) -> anyhow::Result<FederatedProfile>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl GoogleUserInfo {
    /// First and last name, falling back to the full `name` claim and then
    /// to the local part of the email.
    fn names(&self) -> (String, String) {
        let given = self.given_name.as_deref().map(str::trim).unwrap_or_default();
        let family = self.family_name.as_deref().map(str::trim).unwrap_or_default();
        if !given.is_empty() {
            return (given.to_string(), family.to_string());
        }
        if let Some(full) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return match full.split_once(char::is_whitespace) {
                Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
                None => (full.to_string(), family.to_string()),
            };
        }
        let local = self.email.split('@').next().unwrap_or_default().trim();
        (local.to_string(), family.to_string())
    }
}

impl From<GoogleUserInfo> for FederatedProfile {
    fn from(info: GoogleUserInfo) -> Self {
        let (first_name, last_name) = info.names();
        Self {
            provider_id: info.sub,
            email: info.email,
            first_name,
            last_name,
            picture_url: info.picture,
            email_verified: info.email_verified,
        }
    }
}

pub struct GoogleProvider {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build oauth http client")?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let scope = SCOPES.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", state),
        ];
        let query = serde_urlencoded::to_string(&params).context("encode authorize query")?;
        Ok(format!("{GOOGLE_AUTH_URL}?{query}"))
    }

    async fn exchange(&self, code: &str) -> anyhow::Result<FederatedProfile> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .context("google token request")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "google token exchange failed");
            anyhow::bail!("google token exchange failed with {status}");
        }
        let token: GoogleTokenResponse = response.json().await.context("decode token response")?;

        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request")?;
        if !response.status().is_success() {
            let status = response.status();
            error!(%status, "google userinfo request failed");
            anyhow::bail!("google userinfo failed with {status}");
        }
        let info: GoogleUserInfo = response.json().await.context("decode userinfo")?;
        debug!(sub = %info.sub, email_verified = info.email_verified, "google profile fetched");
        Ok(info.into())
    }
}
