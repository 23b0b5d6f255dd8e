use axum::{
    extract::{Query, State},
    http::header,
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use rand::{distributions::Alphanumeric, Rng};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{CallbackQuery, LoginForm, SignupForm},
        error::AuthError,
        repo_types::User,
    },
    pages::views,
    session::{
        extractors::{HOME_PATH, LOGIN_PATH},
        CurrentSession, GuestOnly,
    },
    state::AppState,
};

const SIGNUP_PATH: &str = "/signup";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/signup", get(signup_form).post(signup))
        .route("/auth/google", get(google_redirect))
        .route("/auth/google/callback", get(google_callback))
        .route("/logout", get(logout))
}

/// Turns a strategy outcome into the HTTP response: a fresh session and the
/// dashboard on success, the originating form on recoverable failures, the
/// error page otherwise.
async fn finish(
    state: &AppState,
    session: &CurrentSession,
    outcome: Result<User, AuthError>,
    failure_path: &str,
) -> Response {
    match outcome {
        Ok(user) => match state.sessions.establish(Some(session.id), user.id).await {
            Ok(cookie) => (
                AppendHeaders([(header::SET_COOKIE, cookie)]),
                Redirect::to(HOME_PATH),
            )
                .into_response(),
            Err(e) => AuthError::System(e).into_response(),
        },
        Err(e) if e.is_recoverable() => {
            state.sessions.flash(session.id, &e.user_message()).await;
            Redirect::to(failure_path).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn login_form(State(state): State<AppState>, GuestOnly(session): GuestOnly) -> Html<String> {
    let flash = state.sessions.take_flash(session.id).await;
    Html(views::login(flash.as_deref()))
}

async fn signup_form(State(state): State<AppState>, GuestOnly(session): GuestOnly) -> Html<String> {
    let flash = state.sessions.take_flash(session.id).await;
    Html(views::signup(flash.as_deref()))
}

#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<LoginForm>,
) -> Response {
    let outcome = state.local.authenticate(&form.email, &form.password).await;
    finish(&state, &session, outcome, LOGIN_PATH).await
}

#[instrument(skip(state, session, form))]
pub async fn signup(
    State(state): State<AppState>,
    session: CurrentSession,
    Form(form): Form<SignupForm>,
) -> Response {
    let outcome = state.local.signup(form.into()).await;
    finish(&state, &session, outcome, SIGNUP_PATH).await
}

#[instrument(skip(state, session))]
pub async fn google_redirect(State(state): State<AppState>, session: CurrentSession) -> Response {
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    if let Err(e) = state.sessions.remember_oauth_state(session.id, &csrf).await {
        return AuthError::System(e).into_response();
    }
    match state.oauth.authorize_url(&csrf) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => AuthError::System(e).into_response(),
    }
}

#[instrument(skip(state, session, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    session: CurrentSession,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let outcome = federated_login(&state, &session, query).await;
    finish(&state, &session, outcome, LOGIN_PATH).await
}

async fn federated_login(
    state: &AppState,
    session: &CurrentSession,
    query: CallbackQuery,
) -> Result<User, AuthError> {
    let expected = state.sessions.take_oauth_state(session.id).await?;
    if let Some(reason) = query.error {
        warn!(%reason, "provider returned an error");
        return Err(AuthError::OAuthDenied(reason));
    }
    match (expected, query.state) {
        (Some(expected), Some(got)) if expected == got => {}
        _ => {
            warn!("oauth state mismatch");
            return Err(AuthError::OAuthStateMismatch);
        }
    }
    let Some(code) = query.code else {
        return Err(AuthError::OAuthDenied("missing authorization code".into()));
    };
    let profile = state.oauth.exchange(&code).await?;
    state.resolver.resolve_federated(&profile).await
}

#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: CurrentSession) -> Response {
    if !session.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    let cookie = state.sessions.teardown(session.id).await;
    info!(sid = %session.id, "user logged out");
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to("/"),
    )
        .into_response()
}
