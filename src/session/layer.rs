use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::{
    auth::error::AuthError,
    session::extractors::CurrentSession,
    state::AppState,
};

/// Restores (or starts) the visitor's session and resolves its bound user
/// before any handler runs.
pub async fn load_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let sessions = &state.sessions;
    let sid = sessions.keys().read_cookie(req.headers());

    let (record, fresh) = match sessions.restore(sid).await {
        Ok(Some(record)) => (record, false),
        Ok(None) => match sessions.start_anonymous().await {
            Ok(record) => (record, true),
            Err(e) => return AuthError::System(e).into_response(),
        },
        Err(e) => return AuthError::System(e).into_response(),
    };

    let user = match record.user_id {
        None => None,
        Some(user_id) => match state.resolver.find_by_id(user_id).await {
            Ok(user) => Some(user),
            Err(AuthError::IdentityNotFound(missing)) => {
                error!(user_id = %missing, sid = %record.id, "session bound to vanished user");
                if let Err(e) = sessions.unbind(record.id).await {
                    warn!(error = %e, "failed to unbind session");
                }
                None
            }
            Err(e) => return e.into_response(),
        },
    };

    req.extensions_mut().insert(CurrentSession {
        id: record.id,
        user,
    });

    let mut response = next.run(req).await;
    if fresh && !response.headers().contains_key(header::SET_COOKIE) {
        match sessions.keys().set_cookie(record.id) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "failed to sign session cookie"),
        }
    }
    response
}
