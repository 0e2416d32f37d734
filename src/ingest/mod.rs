//! Upload ingest
//!
//! Turns an uploaded CSV or XLSX file into a [`RawTable`]: a header row plus
//! loosely typed cells. Nothing here knows about the model's schema; typing
//! against the declared features happens in [`crate::reconcile`].

pub mod csv;
pub mod xlsx;

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::domain::features::FeatureValue;

/// Errors raised while reading an uploaded file
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported file type '{0}': upload a .csv or .xlsx file")]
    UnsupportedFormat(String),

    #[error("Could not read CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Could not read Excel workbook: {0}")]
    Xlsx(String),

    #[error("The workbook contains no worksheets")]
    NoWorksheet,

    #[error("The file has no header row")]
    MissingHeader,

    #[error("Duplicate column '{0}' in header")]
    DuplicateColumn(String),

    #[error("Empty column name at position {0}")]
    EmptyColumnName(usize),

    #[error("Row {row} has {found} values but the header has {expected} columns")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("The file contains no data rows")]
    NoRows,
}

/// Accepted upload formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    /// Pick the format from a file name such as `readings.CSV`
    pub fn from_file_name(name: &str) -> Result<Self, UploadError> {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .ok_or_else(|| UploadError::UnsupportedFormat(name.to_string()))
    }
}

/// One cell as read from an upload or a JSON payload, before schema typing
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Read a textual cell the way a CSV reader would infer it
    pub fn infer(raw: &str) -> Self {
        let s = raw.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        if s.eq_ignore_ascii_case("true") {
            return Cell::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Cell::Bool(false);
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Cell::Float(f);
        }
        Cell::Text(s.to_string())
    }
}

impl From<FeatureValue> for Cell {
    fn from(value: FeatureValue) -> Self {
        match value {
            FeatureValue::Bool(b) => Cell::Bool(b),
            FeatureValue::Int(i) => Cell::Int(i),
            FeatureValue::Float(f) => Cell::Float(f),
        }
    }
}

impl From<&serde_json::Value> for Cell {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Cell::Int)
                .or_else(|| n.as_f64().map(Cell::Float))
                .unwrap_or(Cell::Empty),
            Value::String(s) => Cell::infer(s),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Name for a header cell; blank cells become `Unnamed: {idx}` like a
/// spreadsheet index column exported without a label.
pub(crate) fn header_name(idx: usize, raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        format!("Unnamed: {}", idx)
    } else {
        name.to_string()
    }
}

/// Header plus rows of loosely typed cells.
///
/// Every row has exactly `columns.len()` cells and column names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build a table, padding short rows with empty cells and truncating long ones
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, UploadError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for (idx, col) in columns.iter().enumerate() {
            if col.is_empty() {
                return Err(UploadError::EmptyColumnName(idx + 1));
            }
            if !seen.insert(col.as_str()) {
                return Err(UploadError::DuplicateColumn(col.clone()));
            }
        }

        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Single-row table from column/value pairs
    pub fn single_row<I, K>(pairs: I) -> Result<Self, UploadError>
    where
        I: IntoIterator<Item = (K, Cell)>,
        K: Into<String>,
    {
        let (columns, row): (Vec<String>, Vec<Cell>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(columns, vec![row])
    }

    /// Rows of JSON objects; the column set is the union of keys in first-seen order
    pub fn from_json_rows(
        records: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<Self, UploadError> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).map(Cell::from).unwrap_or(Cell::Empty))
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Parse an uploaded file, choosing the reader from its name
pub fn parse_upload(file_name: &str, bytes: &[u8]) -> Result<RawTable, UploadError> {
    let format = UploadFormat::from_file_name(file_name)?;
    let table = match format {
        UploadFormat::Csv => csv::read_csv(bytes)?,
        UploadFormat::Xlsx => xlsx::read_xlsx(bytes)?,
    };

    if table.is_empty() {
        return Err(UploadError::NoRows);
    }

    tracing::debug!(
        file = file_name,
        %format,
        rows = table.len(),
        columns = table.columns().len(),
        "parsed upload"
    );
    Ok(table)
}
