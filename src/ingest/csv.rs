// CSV upload reader

use super::{header_name, Cell, RawTable, UploadError};

/// Read a comma-separated upload. The first record is the header.
pub fn read_csv(bytes: &[u8]) -> Result<RawTable, UploadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(UploadError::MissingHeader);
    }

    let columns: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = if idx == 0 { h.trim_start_matches('\u{feff}') } else { h };
            header_name(idx, h)
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(Cell::infer).collect());
    }

    RawTable::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_basic_csv() {
        let data = b"year,is daylight,visibility\n2022,True,10.0\n2021,False,\n";
        let table = read_csv(data).unwrap();

        assert_eq!(table.columns(), &["year", "is daylight", "visibility"]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.rows()[0],
            vec![Cell::Int(2022), Cell::Bool(true), Cell::Float(10.0)]
        );
        assert_eq!(table.rows()[1][2], Cell::Empty);
    }

    #[test]
    fn test_bom_and_whitespace_stripped_from_header() {
        let data = "\u{feff}day of year , month\n120,4\n".as_bytes();
        let table = read_csv(data).unwrap();
        assert_eq!(table.columns(), &["day of year", "month"]);
    }

    #[test]
    fn test_quoted_header_with_comma() {
        let data = b"\"a, b\",c\n1,2\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.columns(), &["a, b", "c"]);
    }

    #[test]
    fn test_blank_header_cells_are_named() {
        let data = b",year,,month\n0,2022,x,4\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.columns(), &["Unnamed: 0", "year", "Unnamed: 2", "month"]);
        assert_eq!(table.rows()[0][2], Cell::Text("x".to_string()));
    }

    #[test]
    fn test_all_blank_header_is_missing() {
        assert!(matches!(read_csv(b",\n1,2\n"), Err(UploadError::MissingHeader)));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let data = b"year,month\n2022,4,99\n";
        assert!(matches!(read_csv(data), Err(UploadError::Csv(_))));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let data = b"year,month\n2022,4\n,\n2023,5\n";
        let table = read_csv(data).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_non_utf8_is_an_error() {
        let data = b"year\n\xff\xfe\n";
        assert!(read_csv(data).is_err());
    }
}
