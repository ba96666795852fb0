//! `tokio-postgres` implementation of the engine's connection and transaction traits.

use std::future::Future;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use swo_core::{
    Connection, DbResult, IsolationLevel, PipeReader, PipeWriter, Transaction, TxOptions,
};
use tokio_postgres::{CancelToken, Client, NoTls};
use tokio_postgres_rustls_improved::MakeRustlsConnect;
use tracing::{debug, warn};

use crate::connect::{connect_postgres, redact};
use crate::error::{db_error, PgResult};

/// A dedicated connection to one Postgres instance.
pub struct PgConnection {
    client: Client,
    description: String,
    /// `None` for plaintext connections.
    tls: Option<MakeRustlsConnect>,
}

impl PgConnection {
    pub async fn connect(connection_string: &str) -> PgResult<Self> {
        let (client, tls) = connect_postgres(connection_string).await?;
        Ok(Self {
            client,
            description: redact(connection_string),
            tls,
        })
    }

    /// Wrap an existing plaintext client (for testing or externally managed connections).
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            description: "<client>".to_string(),
            tls: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Connection string with the password redacted.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Check that the server answers, returning its version string.
    pub async fn ping(&self) -> PgResult<String> {
        let row = self.client.query_one("SELECT version()", &[]).await?;
        Ok(row.get(0))
    }
}

fn isolation_level(level: IsolationLevel) -> tokio_postgres::IsolationLevel {
    match level {
        IsolationLevel::ReadCommitted => tokio_postgres::IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead => tokio_postgres::IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable => tokio_postgres::IsolationLevel::Serializable,
    }
}

impl Connection for PgConnection {
    type Tx<'a> = PgTransaction<'a>
    where
        Self: 'a;

    fn begin(&mut self, options: TxOptions) -> impl Future<Output = DbResult<PgTransaction<'_>>> + Send {
        async move {
            let cancel = self.client.cancel_token();
            let tls = self.tls.clone();

            let mut builder = self.client.build_transaction();
            if let Some(level) = options.isolation {
                builder = builder.isolation_level(isolation_level(level));
            }
            if options.read_only {
                builder = builder.read_only(true);
            }
            if options.deferrable {
                builder = builder.deferrable(true);
            }

            let tx = builder.start().await.map_err(db_error)?;
            debug!(db = %self.description, ?options, "Transaction started");
            Ok(PgTransaction { tx, cancel, tls })
        }
    }

    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.client.batch_execute(sql).await.map_err(db_error) }
    }
}

/// An open transaction. Dropping it rolls back.
pub struct PgTransaction<'a> {
    tx: tokio_postgres::Transaction<'a>,
    cancel: CancelToken,
    tls: Option<MakeRustlsConnect>,
}

impl PgTransaction<'_> {
    /// Ask the server to abort whatever statement this connection is running.
    ///
    /// The request travels on a separate socket, using the same TLS mode as
    /// the connection itself.
    async fn cancel_query(&self) {
        let result = match &self.tls {
            Some(tls) => self.cancel.cancel_query(tls.clone()).await,
            None => self.cancel.cancel_query(NoTls).await,
        };
        match result {
            Ok(()) => debug!("Cancel request sent"),
            Err(e) => warn!(error = %e, "Failed to send cancel request"),
        }
    }
}

impl Transaction for PgTransaction<'_> {
    fn execute(&self, sql: &str) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.tx.batch_execute(sql).await.map_err(db_error) }
    }

    fn query_count(&self, sql: &str) -> impl Future<Output = DbResult<i64>> + Send {
        async move {
            let row = self.tx.query_one(sql, &[]).await.map_err(db_error)?;
            row.try_get::<_, i64>(0).map_err(db_error)
        }
    }

    fn copy_out(
        &self,
        sql: &str,
        writer: PipeWriter,
    ) -> impl Future<Output = DbResult<u64>> + Send {
        async move {
            let stream = self.tx.copy_out(sql).await.map_err(db_error)?;
            futures::pin_mut!(stream);

            let mut bytes = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(db_error)?;
                bytes += chunk.len() as u64;
                if let Err(e) = writer.write(chunk).await {
                    // Dropping the stream does not stop the server: it would
                    // keep sending the rest of the table, and the next
                    // statement on this connection would wait for all of it.
                    self.cancel_query().await;
                    return Err(e);
                }
            }
            Ok(bytes)
        }
    }

    fn copy_in(
        &self,
        sql: &str,
        mut reader: PipeReader,
    ) -> impl Future<Output = DbResult<u64>> + Send {
        async move {
            // Dropping the sink before `finish` aborts the COPY on the server.
            let sink = self.tx.copy_in::<_, Bytes>(sql).await.map_err(db_error)?;
            futures::pin_mut!(sink);

            while let Some(chunk) = reader.read().await? {
                sink.send(chunk).await.map_err(db_error)?;
            }
            sink.finish().await.map_err(db_error)
        }
    }

    fn commit(self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.tx.commit().await.map_err(db_error) }
    }

    fn rollback(self) -> impl Future<Output = DbResult<()>> + Send {
        async move { self.tx.rollback().await.map_err(db_error) }
    }
}
