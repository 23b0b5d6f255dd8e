use crate::state::AppState;
use axum::Router;

mod dto;
pub mod error;
pub mod federated;
pub mod handlers;
pub mod local;
#[cfg(test)]
pub mod memory;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod resolver;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
