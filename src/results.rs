//! One-row CSV results files and column-ownership merging
//!
//! Every stage writes a single `results.csv` row. Stages build on each
//! other's rows: each one owns a fixed set of columns, overwrites exactly
//! those on merge and leaves everything else alone.

use std::fs;
use std::path::Path;

use crate::error::{HarnessError, Result};
use crate::utils::write_atomic;

/// Columns written by the reorder stage
pub const REORDER_COLUMNS: &[&str] = &[
    "matrix_name",
    "dataset",
    "n_rows",
    "n_cols",
    "nnz",
    "reorder_type",
    "reorder_tech",
    "reord_param_set",
    "reorder_time_ms",
    "reorder_timing_source",
    "exit_code",
    "timestamp",
];

/// Columns written by the metrics step
pub const METRICS_COLUMNS: &[&str] = &[
    "bandwidth",
    "block_density",
    "block_occupancy",
    "metrics_backend",
];

/// Columns written by the multiply stage
pub const MULTIPLY_COLUMNS: &[&str] = &[
    "mult_type",
    "mult_param_set",
    "mult_time_ms",
    "mult_timing_source",
    "gflops",
    "mult_metrics",
    "exit_code",
    "timestamp",
];

/// Order in which newly added columns are appended
pub const CANONICAL_COLUMNS: &[&str] = &[
    "matrix_name",
    "dataset",
    "n_rows",
    "n_cols",
    "nnz",
    "reorder_type",
    "reorder_tech",
    "reord_param_set",
    "reorder_time_ms",
    "reorder_timing_source",
    "bandwidth",
    "block_density",
    "block_occupancy",
    "metrics_backend",
    "mult_type",
    "mult_param_set",
    "mult_time_ms",
    "mult_timing_source",
    "gflops",
    "mult_metrics",
    "exit_code",
    "timestamp",
];

fn canonical_rank(column: &str) -> usize {
    CANONICAL_COLUMNS
        .iter()
        .position(|c| *c == column)
        .unwrap_or(CANONICAL_COLUMNS.len())
}

/// An ordered column -> value map; `None` is NULL
///
/// NULL is stored as an empty CSV field, so an empty string value is
/// normalized to NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsRow {
    columns: Vec<(String, Option<String>)>,
}

impl ResultsRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(c, _)| c == column)
    }

    /// Set a column in place, appending it when absent
    pub fn set(&mut self, column: &str, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        match self.columns.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns.iter().map(|(c, v)| (c.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Copy with the given columns removed
    pub fn without(&self, columns: &[&str]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .filter(|(c, _)| !columns.contains(&c.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Read a one-row results file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| {
                HarnessError::input(format!("cannot read results {}: {}", path.display(), e))
            })?;

        let headers = reader.headers()?.clone();
        let mut records = reader.records();
        let record = match records.next() {
            Some(record) => record.map_err(|e| {
                HarnessError::input(format!("malformed results {}: {}", path.display(), e))
            })?,
            None => {
                return Err(HarnessError::input(format!(
                    "results file {} has no data row",
                    path.display()
                )))
            }
        };
        if records.next().is_some() {
            return Err(HarnessError::input(format!(
                "results file {} has more than one data row",
                path.display()
            )));
        }

        let mut row = Self::new();
        for (column, value) in headers.iter().zip(record.iter()) {
            row.set(column, Some(value.to_string()));
        }
        Ok(row)
    }

    /// Read a results file if one exists
    pub fn read_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if path.exists() {
            Self::read(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Replace the file at `path` with this row
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.column_names())?;
        writer.write_record(self.columns.iter().map(|(_, v)| v.as_deref().unwrap_or("")))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| HarnessError::Io(e.into_error()))?;

        write_atomic(path, &bytes)
    }
}

/// Merge a stage's output into an existing row
///
/// Every column in `owned_columns` and every key of `new_fields` is
/// overwritten; owned columns missing from `new_fields` become NULL. All
/// other columns keep their value and position. Columns the row did not
/// have yet are appended in canonical order.
pub fn merge(
    existing: Option<ResultsRow>,
    new_fields: &[(&str, Option<String>)],
    owned_columns: &[&str],
) -> ResultsRow {
    let mut row = existing.unwrap_or_default();

    let mut targets: Vec<&str> = owned_columns.to_vec();
    for (column, _) in new_fields {
        if !targets.contains(column) {
            targets.push(*column);
        }
    }

    let value_for = |column: &str| {
        new_fields
            .iter()
            .rev()
            .find(|(c, _)| *c == column)
            .and_then(|(_, v)| v.clone())
    };

    let mut appended: Vec<&str> = Vec::new();
    for column in targets {
        if row.contains(column) {
            row.set(column, value_for(column));
        } else {
            appended.push(column);
        }
    }
    appended.sort_by_key(|c| canonical_rank(c));
    for column in appended {
        row.set(column, value_for(column));
    }

    row
}
