use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{config::AppConfig, session::store::SessionStore};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(config.request_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    Ok(db)
}

/// Periodically deletes expired session rows.
pub fn spawn_session_reaper(store: Arc<dyn SessionStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "expired sessions removed"),
                Err(e) => warn!(error = %e, "session purge failed"),
            }
        }
    });
}
