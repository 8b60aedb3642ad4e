// ABOUTME: PostgreSQL connection setup over TLS
// ABOUTME: Spawns the connection task and applies session settings for migrations

use std::time::Duration;

use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::Client;

use crate::error::{MigratorError, Result};

/// Hides the password in a connection URL before it is logged.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}

pub async fn connect(database_url: &str, accept_invalid_certs: bool) -> Result<Client> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| MigratorError::Connection(format!("failed to build TLS connector: {}", e)))?;
    let connector = MakeTlsConnector::new(connector);

    tracing::info!("Connecting to {}", redact_url(database_url));

    let (client, connection) = tokio_postgres::connect(database_url, connector)
        .await
        .map_err(|e| {
            MigratorError::Connection(format!(
                "failed to connect to {}: {}. Check the host, credentials and sslmode",
                redact_url(database_url),
                e
            ))
        })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    Ok(client)
}

/// Caps how long any statement, including the advisory lock, waits for a lock.
pub async fn set_lock_timeout(client: &Client, timeout: Duration) -> Result<()> {
    client
        .batch_execute(&format!("SET lock_timeout = '{}ms'", timeout.as_millis()))
        .await?;
    Ok(())
}
