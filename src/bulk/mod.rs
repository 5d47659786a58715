//! Bulk loading of batch files into the target table.
//!
//! Batches are handed to a [`BatchSink`] strictly in the order the batcher
//! produced them. Each call is one bulk copy followed by one commit, so a
//! failure part-way through leaves earlier batches committed. There is no
//! retry and no resume point.
//!
//! - **`postgres`**: the `COPY ... FROM STDIN` sink backed by a single
//!   `PgConnection`, plus [`bulk_load`] which scopes that connection to a run.

pub mod postgres;

use crate::batch::BatchFile;
use crate::error::BulkLoadError;

pub use postgres::{PgCopySink, bulk_load, copy_statement};

/// Destination for batch files. One call loads and commits one batch.
#[allow(async_fn_in_trait)]
pub trait BatchSink {
    /// Load `batch` and return the number of rows the destination accepted.
    async fn load_batch(&mut self, batch: &BatchFile) -> Result<u64, BulkLoadError>;
}

/// Totals for a completed bulk load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub batches: usize,
    pub rows: u64,
}

impl LoadSummary {
    fn record(&mut self, rows: u64) {
        self.batches += 1;
        self.rows += rows;
    }
}

/// Feed `batches` to `sink` in order, stopping at the first failure.
pub async fn load_batches<S: BatchSink>(
    sink: &mut S,
    batches: &[BatchFile],
) -> Result<LoadSummary, BulkLoadError> {
    let mut summary = LoadSummary::default();

    for (index, batch) in batches.iter().enumerate() {
        let rows = sink.load_batch(batch).await?;
        summary.record(rows);
        log::info!(
            "loaded {} ({} rows, batch {}/{})",
            batch.path.display(),
            rows,
            index + 1,
            batches.len()
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Records every batch it sees; fails on the configured call.
    #[derive(Default)]
    struct RecordingSink {
        seen: Vec<PathBuf>,
        fail_on: Option<usize>,
    }

    impl BatchSink for RecordingSink {
        async fn load_batch(&mut self, batch: &BatchFile) -> Result<u64, BulkLoadError> {
            if self.fail_on == Some(self.seen.len()) {
                return Err(BulkLoadError::Sink {
                    path: batch.path.clone(),
                    message: "rejected".to_string(),
                });
            }
            self.seen.push(batch.path.clone());
            Ok(batch.rows() as u64)
        }
    }

    fn batches() -> Vec<BatchFile> {
        [0..3, 3..6, 6..7]
            .into_iter()
            .map(|range| BatchFile {
                path: PathBuf::from(format!("batch_{}_{}.csv", range.start, range.end)),
                range,
            })
            .collect()
    }

    #[tokio::test]
    async fn loads_every_batch_in_order() {
        let mut sink = RecordingSink::default();
        let summary = load_batches(&mut sink, &batches()).await.expect("load");

        assert_eq!(summary, LoadSummary { batches: 3, rows: 7 });
        assert_eq!(
            sink.seen,
            vec![
                PathBuf::from("batch_0_3.csv"),
                PathBuf::from("batch_3_6.csv"),
                PathBuf::from("batch_6_7.csv"),
            ]
        );
    }

    #[tokio::test]
    async fn failure_stops_remaining_batches() {
        let mut sink = RecordingSink {
            fail_on: Some(1),
            ..RecordingSink::default()
        };

        let err = load_batches(&mut sink, &batches()).await.expect_err("second batch fails");

        assert!(matches!(err, BulkLoadError::Sink { ref path, .. } if path == &PathBuf::from("batch_3_6.csv")));
        assert_eq!(sink.seen, vec![PathBuf::from("batch_0_3.csv")]);
    }

    #[tokio::test]
    async fn no_batches_is_a_no_op() {
        let mut sink = RecordingSink::default();
        let summary = load_batches(&mut sink, &[]).await.expect("load");
        assert_eq!(summary, LoadSummary::default());
        assert!(sink.seen.is_empty());
    }
}
