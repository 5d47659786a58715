use super::{BatchSink, LoadSummary, load_batches};
use crate::batch::BatchFile;
use crate::error::BulkLoadError;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Bytes read from a batch file per COPY data message.
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// `COPY` statement for CSV input with a header line and the given delimiter.
///
/// `table` must already be a validated plain identifier; it is inserted unquoted.
pub fn copy_statement(table: &str, delimiter: char) -> String {
    let delimiter = if delimiter == '\'' {
        "''".to_string()
    } else {
        delimiter.to_string()
    };
    format!("COPY {table} FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER '{delimiter}')")
}

/// Streams batch files into PostgreSQL over one connection, one transaction per batch.
pub struct PgCopySink {
    conn: PgConnection,
    statement: String,
}

impl PgCopySink {
    pub fn new(conn: PgConnection, table: &str, delimiter: char) -> Self {
        Self {
            conn,
            statement: copy_statement(table, delimiter),
        }
    }

    pub async fn connect(
        options: &PgConnectOptions,
        table: &str,
        delimiter: char,
    ) -> Result<Self, BulkLoadError> {
        let conn = PgConnection::connect_with(options)
            .await
            .map_err(BulkLoadError::Connect)?;
        log::debug!("connected to database, target statement: {}", copy_statement(table, delimiter));
        Ok(Self::new(conn, table, delimiter))
    }

    /// Gracefully terminate the connection.
    pub async fn close(self) -> Result<(), BulkLoadError> {
        self.conn.close().await.map_err(BulkLoadError::Close)
    }
}

impl BatchSink for PgCopySink {
    async fn load_batch(&mut self, batch: &BatchFile) -> Result<u64, BulkLoadError> {
        let copy_error = |source: sqlx::Error| BulkLoadError::Copy {
            path: batch.path.clone(),
            source,
        };

        let mut file = File::open(&batch.path)
            .await
            .map_err(|source| BulkLoadError::Open {
                path: batch.path.clone(),
                source,
            })?;

        let mut tx = self.conn.begin().await.map_err(copy_error)?;
        let mut copy = tx.copy_in_raw(&self.statement).await.map_err(copy_error)?;

        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        loop {
            let read = match file.read(&mut buf).await {
                Ok(read) => read,
                Err(source) => {
                    // The transaction is rolled back when `tx` drops.
                    let _ = copy.abort(format!("failed to read {}", batch.path.display())).await;
                    return Err(BulkLoadError::Open {
                        path: batch.path.clone(),
                        source,
                    });
                }
            };
            if read == 0 {
                break;
            }
            copy.send(&buf[..read]).await.map_err(copy_error)?;
        }

        let rows = copy.finish().await.map_err(copy_error)?;

        tx.commit().await.map_err(|source| BulkLoadError::Commit {
            path: batch.path.clone(),
            source,
        })?;

        Ok(rows)
    }
}

/// Load `batches` over a single connection opened for this call only.
///
/// The connection is closed whether or not loading succeeds. Batches
/// committed before a failure stay committed.
pub async fn bulk_load(
    options: &PgConnectOptions,
    table: &str,
    delimiter: char,
    batches: &[BatchFile],
) -> Result<LoadSummary, BulkLoadError> {
    if batches.is_empty() {
        log::info!("no batch files to load");
        return Ok(LoadSummary::default());
    }

    let mut sink = PgCopySink::connect(options, table, delimiter).await?;
    let result = load_batches(&mut sink, batches).await;
    let closed = sink.close().await;

    match (result, closed) {
        (Ok(summary), Ok(())) => Ok(summary),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            log::warn!("connection close also failed: {}", close_err);
            Err(err)
        }
    }
}
