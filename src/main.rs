use std::sync::Arc;
use std::time::Duration;

mod app;
mod auth;
mod config;
mod db;
mod pages;
mod session;
mod state;

use crate::{config::AppConfig, session::store::PgSessionStore, state::AppState};

const REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "carepoint=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    let pool = db::connect(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    db::spawn_session_reaper(Arc::new(PgSessionStore::new(pool.clone())), REAP_INTERVAL);

    let state = AppState::postgres(config, pool)?;
    app::serve(app::build_app(state)).await
}
