use std::path::PathBuf;
use thiserror::Error;

/// Invalid or missing run options, detected before any file or database work.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid table name '{0}': expected [schema.]identifier")]
    InvalidTable(String),
    #[error("unusable delimiter {0:?}: must be a single ASCII character other than quote, CR or LF")]
    InvalidDelimiter(char),
}

/// Failures while reading the input file into a table.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no header line")]
    MissingHeader { path: PathBuf },
}

/// Failures while splitting a table into batch files.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("failed to create batch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write batch file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Failures while streaming batch files into the database.
#[derive(Debug, Error)]
pub enum BulkLoadError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to read batch file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("COPY failed for {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
    #[error("commit failed for {path}: {source}")]
    Commit {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to close database connection: {0}")]
    Close(#[source] sqlx::Error),
    #[error("failed to load {path}: {message}")]
    Sink { path: PathBuf, message: String },
}

/// Any failure that aborts a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("read error: {0}")]
    Load(#[from] LoadError),
    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
    #[error("bulk load error: {0}")]
    BulkLoad(#[from] BulkLoadError),
}
