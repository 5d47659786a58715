//! Splits a [`Table`] into contiguous row ranges and writes each range to
//! its own CSV file.

use crate::error::BatchError;
use crate::loader::Table;
use csv::WriterBuilder;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// One batch written to disk: the file and the `[start, end)` table rows it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    pub path: PathBuf,
    pub range: Range<usize>,
}

impl BatchFile {
    pub fn rows(&self) -> usize {
        self.range.len()
    }
}

/// `[0, n), [n, 2n), ...` up to `row_count`; the last range may be short.
pub fn batch_ranges(row_count: usize, batch_size: NonZeroUsize) -> Vec<Range<usize>> {
    let size = batch_size.get();
    (0..row_count)
        .step_by(size)
        .map(|start| start..start.saturating_add(size).min(row_count))
        .collect()
}

pub fn batch_file_name(range: &Range<usize>) -> String {
    format!("batch_{}_{}.csv", range.start, range.end)
}

/// Write `table` to `out_dir` as one CSV file per batch, in row order.
///
/// Files already written stay on disk when a later write fails. An empty
/// table produces no files.
pub fn write_batches(
    table: &Table,
    batch_size: usize,
    out_dir: &Path,
    delimiter: u8,
) -> Result<Vec<BatchFile>, BatchError> {
    let batch_size = NonZeroUsize::new(batch_size).ok_or(BatchError::InvalidBatchSize)?;

    std::fs::create_dir_all(out_dir).map_err(|source| BatchError::CreateDir {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for range in batch_ranges(table.len(), batch_size) {
        let path = out_dir.join(batch_file_name(&range));
        write_batch(table, &range, &path, delimiter)?;
        log::info!(
            "batch {}..{} ({} rows) saved to {}",
            range.start,
            range.end,
            range.len(),
            path.display()
        );
        files.push(BatchFile { path, range });
    }

    if files.is_empty() {
        log::info!("table is empty, no batch files written");
    }

    Ok(files)
}

fn write_batch(
    table: &Table,
    range: &Range<usize>,
    path: &Path,
    delimiter: u8,
) -> Result<(), BatchError> {
    let write_error = |source: csv::Error| BatchError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(write_error)?;

    writer.write_record(table.headers()).map_err(write_error)?;
    for row in &table.rows()[range.clone()] {
        writer.write_record(row).map_err(write_error)?;
    }
    writer
        .flush()
        .map_err(|err| write_error(csv::Error::from(err)))?;

    Ok(())
}
