use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Redirect,
};
use uuid::Uuid;

use crate::auth::repo_types::User;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard";

/// Session attached to the request by the session layer.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: Uuid,
    pub user: Option<User>,
}

impl CurrentSession {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "session layer missing"))
    }
}

/// Route guard: anonymous requests are redirected to the login page before
/// the handler runs.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .and_then(|s| s.user.clone())
            .map(CurrentUser)
            .ok_or(Redirect::to(LOGIN_PATH))
    }
}

/// Guard for the login and signup forms: signed-in visitors go to the dashboard.
pub struct GuestOnly(pub CurrentSession);

#[async_trait]
impl<S> FromRequestParts<S> for GuestOnly
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentSession>() {
            Some(session) if session.is_authenticated() => Err(Redirect::to(HOME_PATH)),
            Some(session) => Ok(GuestOnly(session.clone())),
            // Without the layer there is no session to be signed into.
            None => Err(Redirect::to(LOGIN_PATH)),
        }
    }
}
