//! Reads a delimited input file into an in-memory [`Table`].
//!
//! Rows whose field count differs from the header are skipped rather than
//! failing the read, and the artifact column left behind by trailing
//! delimiters is removed before the table is handed on.

use crate::error::LoadError;
use csv::{ReaderBuilder, StringRecord};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of rows shown in the diagnostic sample.
const SAMPLE_ROWS: usize = 5;

/// Header plus rows, every row holding exactly one field per header column.
///
/// Header names are unique: a repeated name gets a `.1`, `.2`, ... suffix.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<StringRecord>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Removes the named column from the header and every row. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };

        self.headers.remove(index);
        for row in &mut self.rows {
            *row = row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, field)| field)
                .collect();
        }
        true
    }
}

/// Options controlling how the input file is parsed.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    /// Column removed after parsing when present.
    pub artifact_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: crate::config::DEFAULT_DELIMITER as u8,
            artifact_column: crate::config::DEFAULT_ARTIFACT_COLUMN.to_string(),
        }
    }
}

/// A parsed table and the number of input lines dropped for a bad field count.
#[derive(Debug)]
pub struct LoadedTable {
    pub table: Table,
    pub skipped_rows: usize,
}

/// Name given to a header cell that is blank, e.g. the one after a trailing delimiter.
fn unnamed_column(index: usize) -> String {
    format!("Unnamed: {index}")
}

/// Give repeated header names a numeric suffix, skipping names already taken.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut unique = Vec::with_capacity(headers.len());

    for name in headers {
        let mut candidate = name.clone();
        while taken.contains(&candidate) {
            let count = counts.entry(name.clone()).or_insert(0);
            *count += 1;
            candidate = format!("{name}.{count}");
        }
        taken.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

/// Read `path` into a [`Table`] and log its size and first rows.
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<LoadedTable, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let loaded = read_table(file, path, options)?;

    log::info!(
        "read {} rows from {} ({} columns)",
        loaded.table.len(),
        path.display(),
        loaded.table.headers().len()
    );
    if loaded.skipped_rows > 0 {
        log::warn!(
            "skipped {} malformed lines in {} (field count did not match header)",
            loaded.skipped_rows,
            path.display()
        );
    }
    log::info!(
        "first rows:\n{}",
        format_sample(&loaded.table, options.delimiter, SAMPLE_ROWS)
    );

    Ok(loaded)
}

/// Parse delimited text from any reader; `path` is only used for error context.
pub fn read_table<R: Read>(
    source: R,
    path: &Path,
    options: &LoadOptions,
) -> Result<LoadedTable, LoadError> {
    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let header_record = reader.headers().map_err(csv_error)?.clone();
    if header_record.is_empty() {
        return Err(LoadError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let headers: Vec<String> = header_record
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if name.trim().is_empty() {
                unnamed_column(i)
            } else {
                name.to_string()
            }
        })
        .collect();
    let headers = dedupe_headers(headers);

    let width = headers.len();
    let mut rows = Vec::new();
    let mut skipped_rows = 0;

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.len() != width {
            skipped_rows += 1;
            log::debug!(
                "skipping line {}: expected {} fields, saw {}",
                record.position().map(|p| p.line()).unwrap_or_default(),
                width,
                record.len()
            );
            continue;
        }
        rows.push(record);
    }

    let mut table = Table::new(headers, rows);
    if table.drop_column(&options.artifact_column) {
        log::debug!("dropped artifact column '{}'", options.artifact_column);
    }

    Ok(LoadedTable {
        table,
        skipped_rows,
    })
}

fn format_sample(table: &Table, delimiter: u8, limit: usize) -> String {
    let separator = (delimiter as char).to_string();
    let mut lines = vec![table.headers().join(&separator)];
    lines.extend(
        table
            .rows()
            .iter()
            .take(limit)
            .map(|row| row.iter().collect::<Vec<_>>().join(&separator)),
    );
    lines.join("\n")
}
