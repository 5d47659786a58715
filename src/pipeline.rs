//! One complete run: read the input file, split it into batch files, and
//! bulk-load the batches in order.

use crate::batch::{BatchFile, write_batches};
use crate::bulk::{BatchSink, LoadSummary, bulk_load, load_batches};
use crate::config::LoaderConfig;
use crate::error::PipelineError;
use crate::loader::{LoadOptions, load_table};
use std::time::Instant;

/// Result of the read-and-split stage.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub batches: Vec<BatchFile>,
}

/// Totals for a finished run. `load` is `None` for dry runs.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub split: SplitOutcome,
    pub load: Option<LoadSummary>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} rows read, {} malformed lines skipped, {} batch files written",
            self.split.rows_read,
            self.split.rows_skipped,
            self.split.batches.len()
        )?;
        match &self.load {
            Some(load) => write!(f, ", {} rows copied in {} batches", load.rows, load.batches),
            None => write!(f, ", load skipped (dry run)"),
        }
    }
}

/// Read the input file and write its batch files. The table is dropped on return.
pub fn split_input(config: &LoaderConfig) -> Result<SplitOutcome, PipelineError> {
    config.validate()?;
    let options = LoadOptions {
        delimiter: config.delimiter_byte(),
        artifact_column: config.artifact_column.clone(),
    };
    let loaded = load_table(&config.input, &options)?;

    let batches = write_batches(
        &loaded.table,
        config.batch_size,
        &config.output_dir,
        config.delimiter_byte(),
    )?;

    Ok(SplitOutcome {
        rows_read: loaded.table.len(),
        rows_skipped: loaded.skipped_rows,
        batches,
    })
}

/// Run every stage against PostgreSQL using the connection settings in `config`.
pub async fn run(config: &LoaderConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    // Dry runs never connect, so their connection settings are not checked.
    let connect_options = if config.dry_run {
        None
    } else {
        Some(config.database.connect_options()?)
    };
    let started = Instant::now();

    let split = split_input(config)?;

    let Some(connect_options) = connect_options else {
        for batch in &split.batches {
            log::info!("dry run: would load {}", batch.path.display());
        }
        return Ok(RunSummary { split, load: None });
    };

    let load = bulk_load(&connect_options, &config.table, config.delimiter, &split.batches).await?;
    log::info!("run finished in {:?}", started.elapsed());

    Ok(RunSummary {
        split,
        load: Some(load),
    })
}

/// Run every stage, loading batches into `sink` instead of a database connection.
pub async fn run_with_sink<S: BatchSink>(
    config: &LoaderConfig,
    sink: &mut S,
) -> Result<RunSummary, PipelineError> {
    let split = split_input(config)?;

    if config.dry_run {
        return Ok(RunSummary { split, load: None });
    }

    let load = load_batches(sink, &split.batches).await?;
    Ok(RunSummary {
        split,
        load: Some(load),
    })
}
