//! Feature reconciliation
//!
//! Aligns an arbitrary input table with the column list the frozen model was
//! trained on:
//! - columns named in the declared schema are coerced to their declared kind
//! - expected columns missing from the input are filled with the kind's
//!   neutral default (`false` for flags, `0` otherwise)
//! - the result holds exactly the expected columns, in the expected order;
//!   extra input columns are dropped
//!
//! Missing columns and empty cells are never errors. A value that cannot be
//! read as its column's kind is.

use thiserror::Error;

use crate::domain::features::{FeatureKind, FeatureSchema, FeatureTable, FeatureValue};
use crate::ingest::{Cell, RawTable};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("Column '{column}', row {row}: cannot read '{value}' as {kind}")]
    InvalidValue {
        column: String,
        /// 1-based data row
        row: usize,
        value: String,
        kind: FeatureKind,
    },
}

/// Reconciled table plus what had to change to get there
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub table: FeatureTable,
    /// Expected columns absent from the input, filled with defaults
    pub filled: Vec<String>,
    /// Input columns the model does not use
    pub dropped: Vec<String>,
}

/// Coerce one cell to `kind`. `Ok(None)` means the cell is empty.
fn coerce_cell(cell: &Cell, kind: FeatureKind) -> Result<Option<FeatureValue>, ()> {
    let value = match kind {
        FeatureKind::Integer | FeatureKind::Categorical => match cell {
            Cell::Empty => return Ok(None),
            Cell::Int(i) => FeatureValue::Int(*i),
            Cell::Bool(b) => FeatureValue::Int(i64::from(*b)),
            Cell::Float(f) => FeatureValue::Int(whole(*f)?),
            Cell::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => FeatureValue::Int(i),
                    Err(_) => FeatureValue::Int(whole(s.parse::<f64>().map_err(|_| ())?)?),
                }
            }
        },
        FeatureKind::Float => match cell {
            Cell::Empty => return Ok(None),
            Cell::Int(i) => FeatureValue::Float(*i as f64),
            Cell::Bool(b) => FeatureValue::Float(if *b { 1.0 } else { 0.0 }),
            Cell::Float(f) => FeatureValue::Float(finite(*f)?),
            Cell::Text(s) => FeatureValue::Float(finite(s.trim().parse::<f64>().map_err(|_| ())?)?),
        },
        FeatureKind::Boolean => match cell {
            Cell::Empty => return Ok(None),
            Cell::Bool(b) => FeatureValue::Bool(*b),
            Cell::Int(i) => FeatureValue::Bool(*i != 0),
            Cell::Float(f) => FeatureValue::Bool(finite(*f)? != 0.0),
            Cell::Text(s) => FeatureValue::Bool(parse_flag(s).ok_or(())?),
        },
    };
    Ok(Some(value))
}

fn finite(f: f64) -> Result<f64, ()> {
    if f.is_finite() {
        Ok(f)
    } else {
        Err(())
    }
}

fn whole(f: f64) -> Result<i64, ()> {
    let f = finite(f)?;
    if f.fract() != 0.0 || f < i64::MIN as f64 || f > i64::MAX as f64 {
        return Err(());
    }
    Ok(f as i64)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Align `input` with the model's `expected` column list.
///
/// Column kinds come from `schema`; expected columns the schema does not
/// declare are treated as floats.
pub fn reconcile(
    input: &RawTable,
    expected: &[String],
    schema: &FeatureSchema,
) -> Result<Reconciled, ReconcileError> {
    let plan: Vec<(FeatureKind, FeatureValue, Option<usize>)> = expected
        .iter()
        .map(|col| {
            let kind = schema.kind_of(col).unwrap_or(FeatureKind::Float);
            (kind, schema.missing_default(col), input.column_index(col))
        })
        .collect();

    let mut rows = Vec::with_capacity(input.len());
    for (row_idx, raw) in input.rows().iter().enumerate() {
        let mut row = Vec::with_capacity(expected.len());
        for (col, &(kind, default, source)) in expected.iter().zip(plan.iter()) {
            let value = match source {
                None => default,
                Some(idx) => {
                    let cell = &raw[idx];
                    coerce_cell(cell, kind)
                        .map_err(|_| ReconcileError::InvalidValue {
                            column: col.clone(),
                            row: row_idx + 1,
                            value: cell.to_string(),
                            kind,
                        })?
                        .unwrap_or(default)
                }
            };
            row.push(value);
        }
        rows.push(row);
    }

    let filled: Vec<String> = expected
        .iter()
        .zip(plan.iter())
        .filter(|(_, (_, _, source))| source.is_none())
        .map(|(col, _)| col.clone())
        .collect();
    let dropped: Vec<String> = input
        .columns()
        .iter()
        .filter(|c| !expected.contains(c))
        .cloned()
        .collect();

    if !filled.is_empty() || !dropped.is_empty() {
        tracing::debug!(?filled, ?dropped, rows = rows.len(), "reconciled input columns");
    }

    Ok(Reconciled {
        table: FeatureTable::from_parts(expected.to_vec(), rows),
        filled,
        dropped,
    })
}
