use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect credentials")]
    InvalidCredentials,
    #[error("account registered via external provider")]
    AccountProviderMismatch,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("invalid signup: {0}")]
    InvalidSignup(String),
    #[error("oauth state missing or mismatched")]
    OAuthStateMismatch,
    #[error("provider denied authorization: {0}")]
    OAuthDenied(String),
    #[error("provider has not verified the email address")]
    UnverifiedFederatedEmail,
    #[error("malformed federated profile: {0}")]
    MalformedFederatedProfile(String),
    #[error("session bound to unknown user {0}")]
    IdentityNotFound(Uuid),
    #[error(transparent)]
    System(#[from] anyhow::Error),
}

impl AuthError {
    /// Recoverable failures send the visitor back to the form they came from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::AccountProviderMismatch
                | Self::DuplicateEmail
                | Self::InvalidSignup(_)
                | Self::OAuthStateMismatch
                | Self::OAuthDenied(_)
                | Self::UnverifiedFederatedEmail
        )
    }

    /// Message for the flash channel. Unknown email and wrong password read the same.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Incorrect email or password.".into(),
            Self::AccountProviderMismatch => {
                "This account was created with Google. Please sign in with Google.".into()
            }
            Self::DuplicateEmail => "An account with this email already exists.".into(),
            Self::InvalidSignup(reason) => reason.clone(),
            Self::UnverifiedFederatedEmail => {
                "Your Google email address is not verified. Verify it with Google and try again."
                    .into()
            }
            Self::OAuthStateMismatch | Self::OAuthDenied(_) => {
                "Google sign-in was cancelled or could not be verified.".into()
            }
            _ => "Something went wrong. Please try again later.".into(),
        }
    }
}

/// Error page. Recoverable failures never get here: handlers turn them into a
/// flash message and a redirect back to the form.
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = format!(
            "<!doctype html><title>Error</title><h1>{}</h1><p>{}</p><a href=\"/\">Home</a>",
            status.as_u16(),
            html_escape::encode_text(&self.user_message())
        );
        (status, Html(body)).into_response()
    }
}
