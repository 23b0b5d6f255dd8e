use axum::http::{header, HeaderMap, HeaderValue};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;

const ISSUER: &str = "carepoint";

/// Payload of the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sid: Uuid,   // server-side session id
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
}

/// Signs session ids into cookie values and writes the cookie headers.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionKeys {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::hours(config.ttl_hours),
            secure: config.secure_cookie,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign(&self, sid: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sid,
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
            iss: ISSUER.to_string(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(%sid, "session token signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Uuid> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims.sid)
    }

    /// Session id carried by the request's cookie, if it is present and genuine.
    pub fn read_cookie(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                (name == self.cookie_name).then_some(value)
            })?;
        match self.verify(token) {
            Ok(sid) => Some(sid),
            Err(e) => {
                debug!(error = %e, "ignoring invalid session cookie");
                None
            }
        }
    }

    pub fn set_cookie(&self, sid: Uuid) -> anyhow::Result<HeaderValue> {
        let token = self.sign(sid)?;
        let value = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.cookie_name,
            token,
            self.ttl.whole_seconds(),
            if self.secure { "; Secure" } else { "" }
        );
        Ok(HeaderValue::from_str(&value)?)
    }

    pub fn clear_cookie(&self) -> HeaderValue {
        let value = format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.cookie_name,
            if self.secure { "; Secure" } else { "" }
        );
        HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("sid=; Max-Age=0"))
    }
}
