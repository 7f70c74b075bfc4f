//! Shared helpers for the integration tests.

use imdb_loader::config::{ConnectionConfig, Credentials};
use imdb_loader::db::{DatabaseClient, PostgresClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Connection config for the server in DATABASE_URL, pointed at its database.
pub fn admin_config() -> Option<ConnectionConfig> {
    let url = Url::parse(&std::env::var("DATABASE_URL").ok()?).ok()?;
    let database = url.path().trim_start_matches('/');
    Some(ConnectionConfig::new(
        url.host_str().unwrap_or("localhost"),
        url.port().unwrap_or(5432),
        if database.is_empty() { "postgres" } else { database },
        Credentials {
            user: url.username().to_string(),
            password: url.password().unwrap_or_default().to_string(),
        },
    ))
}

/// A database name no other test run uses.
pub fn scratch_database_name(prefix: &str) -> String {
    format!(
        "{prefix}_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// Drops a scratch database, ignoring errors.
pub async fn drop_database(admin: &ConnectionConfig, name: &str) {
    if let Ok(client) = PostgresClient::connect(admin).await {
        let _ = client
            .execute_query(&format!("DROP DATABASE IF EXISTS \"{name}\" WITH (FORCE)"))
            .await;
        let _ = client.close().await;
    }
}
