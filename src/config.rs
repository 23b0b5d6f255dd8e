/// How a federated login that matches an existing email is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountLinking {
    /// Record the provider id on the existing row so later logins hit the id lookup.
    Attach,
    /// Reuse the existing row as-is, leaving `federated_id` unset.
    Reuse,
}

impl AccountLinking {
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "attach" => Ok(Self::Attach),
            "reuse" => Ok(Self::Reuse),
            other => anyhow::bail!("unknown ACCOUNT_LINKING value: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub google: GoogleConfig,
    pub account_linking: AccountLinking,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            cookie_name: std::env::var("SESSION_COOKIE")
                .unwrap_or_else(|_| "carepoint.sid".into()),
            ttl_hours: std::env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
            secure_cookie: production,
        };
        let google = GoogleConfig {
            client_id: std::env::var("GOOGLE_CLIENT_ID")?,
            client_secret: std::env::var("GOOGLE_CLIENT_SECRET")?,
            callback_url: std::env::var("GOOGLE_CALLBACK_URL")
                .unwrap_or_else(|_| "http://localhost:3000/auth/google/callback".into()),
        };
        let account_linking = match std::env::var("ACCOUNT_LINKING") {
            Ok(raw) => AccountLinking::parse(&raw)?,
            Err(_) => AccountLinking::Attach,
        };
        let request_timeout_secs = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        Ok(Self {
            database_url,
            session,
            google,
            account_linking,
            request_timeout_secs,
        })
    }
}
