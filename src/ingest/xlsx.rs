// Excel (.xlsx) upload reader

use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;

use super::{header_name, Cell, RawTable, UploadError};

/// Read the first worksheet of an uploaded workbook.
///
/// The first row holding any value is the header; fully empty rows are skipped.
/// A value to the right of the last header cell is an error, as in the CSV reader.
pub fn read_xlsx(bytes: &[u8]) -> Result<RawTable, UploadError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> =
        Xlsx::new(cursor).map_err(|e| UploadError::Xlsx(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names.first().ok_or(UploadError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| UploadError::Xlsx(e.to_string()))?;

    let mut rows = range
        .rows()
        .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)));

    let header = rows.next().ok_or(UploadError::MissingHeader)?;

    // Trailing header cells left blank are padding from the used range, not columns
    let width = used_width(header);
    let columns: Vec<String> = header
        .iter()
        .take(width)
        .enumerate()
        .map(|(idx, cell)| header_name(idx, &header_text(cell)))
        .collect();

    let mut data: Vec<Vec<Cell>> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let found = used_width(row);
        if found > width {
            return Err(UploadError::RaggedRow {
                row: idx + 1,
                found,
                expected: width,
            });
        }
        data.push(row.iter().take(width).map(to_cell).collect());
    }

    RawTable::new(columns, data)
}

/// Position just past the last non-empty cell
fn used_width(row: &[Data]) -> usize {
    row.iter()
        .rposition(|cell| !matches!(cell, Data::Empty))
        .map(|i| i + 1)
        .unwrap_or(0)
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::infer(s),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}
