//! Shared Postgres connection utilities with TLS support.

use std::sync::Arc;

use rustls::ClientConfig;
use tokio_postgres::Client;
use tokio_postgres_rustls_improved::MakeRustlsConnect;

use crate::error::{PgError, PgResult};

/// Connect to Postgres with appropriate TLS settings based on sslmode in connection string.
/// Spawns the connection task. The TLS connector is returned so out-of-band
/// requests such as query cancellation use the same transport.
pub(crate) async fn connect_postgres(
    connection_string: &str,
) -> PgResult<(Client, Option<MakeRustlsConnect>)> {
    let redacted = redact(connection_string);

    if let Some(connector) = tls_connector(connection_string)? {
        let (client, connection) = tokio_postgres::connect(connection_string, connector.clone())
            .await
            .map_err(|e| PgError::Connection(format!("{}: {}", redacted, e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(db = %redacted, error = %e, "Postgres connection error");
            }
        });

        Ok((client, Some(connector)))
    } else {
        let (client, connection) =
            tokio_postgres::connect(connection_string, tokio_postgres::NoTls)
                .await
                .map_err(|e| PgError::Connection(format!("{}: {}", redacted, e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(db = %redacted, error = %e, "Postgres connection error");
            }
        });

        Ok((client, None))
    }
}

/// A rustls connector when the connection string asks for TLS.
fn tls_connector(connection_string: &str) -> PgResult<Option<MakeRustlsConnect>> {
    if !requires_tls(connection_string) {
        return Ok(None);
    }

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| PgError::Connection(format!("TLS config error: {}", e)))?
            .with_root_certificates(root_certs())
            .with_no_client_auth();

    Ok(Some(MakeRustlsConnect::new(config)))
}

/// Get root certificates from webpki-roots.
fn root_certs() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

/// Check if the connection string requires TLS.
fn requires_tls(connection_string: &str) -> bool {
    connection_string.contains("sslmode=require")
        || connection_string.contains("sslmode=verify-ca")
        || connection_string.contains("sslmode=verify-full")
}

/// Connection string with the password removed, for logs and status output.
///
/// Handles both URL (`postgres://...`) and key-value (`host=... password=...`) forms.
pub fn redact(connection_string: &str) -> String {
    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        return match url::Url::parse(connection_string) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<invalid connection url>".to_string(),
        };
    }

    connection_string
        .split_whitespace()
        .map(|part| match part.split_once('=') {
            Some(("password", _)) => "password=***".to_string(),
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
