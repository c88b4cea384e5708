use crate::error::{AppError, AppResult};
use crate::schema::{schema_columns, Mode};
use crate::types::{RawRow, Table};
use crate::util::normalize_header;
use csv::{ReaderBuilder, Trim};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub blank_rows: usize,
    /// Rows holding bytes that are not UTF-8 (e.g. cp1252 exports); kept
    /// with the bad bytes replaced.
    pub lossy_rows: usize,
    /// Records the CSV reader could not parse at all; skipped.
    pub parse_errors: usize,
    pub unknown_columns: Vec<String>,
    pub missing_columns: Vec<String>,
}

fn decode_cell(bytes: &[u8]) -> (String, bool) {
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => (s.to_string(), false),
        Cow::Owned(s) => (s, true),
    }
}

/// Read CSV text into a [`Table`]. Headers are normalized and fully blank
/// lines are dropped; cell values are kept as raw text for the validator.
/// A bad record never aborts the load.
pub fn read_table<R: Read>(reader: R) -> AppResult<(Table, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .byte_headers()?
        .iter()
        .map(|h| normalize_header(&decode_cell(h).0))
        .collect();
    let mut table = Table::new(columns.clone());
    let mut report = LoadReport::default();

    for result in rdr.byte_records() {
        let record = match result {
            Ok(r) => r,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable csv record");
                report.parse_errors += 1;
                continue;
            }
        };
        report.total_rows += 1;
        let cells: Vec<(String, bool)> = record.iter().map(decode_cell).collect();
        if cells.iter().all(|(c, _)| c.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }
        if cells.iter().any(|(_, lossy)| *lossy) {
            report.lossy_rows += 1;
            debug!(row = report.total_rows, "replaced invalid utf-8 in record");
        }
        // Short rows simply lack the trailing columns; extra cells are ignored.
        let row: RawRow = columns
            .iter()
            .zip(cells)
            .map(|(k, (v, _))| (k.clone(), v))
            .collect();
        table.push_row(row);
    }

    if report.lossy_rows > 0 {
        warn!(rows = report.lossy_rows, "input is not valid UTF-8; bad bytes replaced");
    }
    debug!(
        rows = table.len(),
        blank = report.blank_rows,
        skipped = report.parse_errors,
        "csv table read"
    );
    Ok((table, report))
}

/// Compare a table's header against the schema for `mode`.
pub fn check_columns(table: &Table, mode: Mode, report: &mut LoadReport) {
    let schema = schema_columns(mode);
    report.unknown_columns = table
        .columns
        .iter()
        .filter(|c| !schema.iter().any(|s| s.name == c.as_str()))
        .cloned()
        .collect();
    report.missing_columns = schema
        .iter()
        .filter(|s| s.required && !table.columns.iter().any(|c| c == s.name))
        .map(|s| s.name.to_string())
        .collect();
    if !report.unknown_columns.is_empty() {
        warn!(mode = %mode, columns = ?report.unknown_columns, "ignoring unknown columns");
    }
    if !report.missing_columns.is_empty() {
        warn!(mode = %mode, columns = ?report.missing_columns, "required columns absent from header");
    }
}

pub fn load_table<R: Read>(reader: R, mode: Mode) -> AppResult<(Table, LoadReport)> {
    let (table, mut report) = read_table(reader)?;
    check_columns(&table, mode, &mut report);
    if table.is_empty() {
        warn!(mode = %mode, "file contains no data rows");
    }
    Ok((table, report))
}

pub fn load_table_file(path: impl AsRef<Path>, mode: Mode) -> AppResult<(Table, LoadReport)> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if matches!(ext.as_deref(), Some("xlsx") | Some("xls")) {
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "{}: spreadsheet files are not supported, save the sheet as CSV",
                path.display()
            ),
        )));
    }
    let file = std::fs::File::open(path)?;
    let loaded = load_table(file, mode)?;
    info!(
        path = %path.display(),
        mode = %mode,
        rows = loaded.0.len(),
        "loaded input table"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRADER_CSV: &str = "\
Product Name, Standard Price ,promo_price,COGS,Notes
Widget A,29.99,24.99,12.00,spring
,,,,
Widget B,\"1,049.99\",899.99,400
";

    #[test]
    fn headers_are_normalized_and_blank_rows_skipped() {
        let (table, report) = load_table(GRADER_CSV.as_bytes(), Mode::Grader).unwrap();
        assert_eq!(
            table.columns,
            vec!["product_name", "standard_price", "promo_price", "cogs", "notes"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.blank_rows, 1);
        assert_eq!(report.unknown_columns, vec!["notes".to_string()]);
        assert!(report.missing_columns.is_empty());
        assert_eq!(table.rows[1]["standard_price"], "1,049.99");
        assert!(!table.rows[1].contains_key("notes"));
    }

    #[test]
    fn non_utf8_row_does_not_sink_the_upload() {
        let mut bytes = b"product_name,standard_price,promo_price,cogs\nGood,10,8,4\nCaf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b",10,8,4\nAlsoGood,20,15,5\n");
        let (table, report) = load_table(bytes.as_slice(), Mode::Grader).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(report.lossy_rows, 1);
        assert_eq!(report.parse_errors, 0);
        assert!(table.rows[1]["product_name"].starts_with("Caf"));
        assert_eq!(table.rows[2]["product_name"], "AlsoGood");
        let outcome = crate::validator::validate_grader(&table);
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.is_clean());
    }

    #[test]
    fn missing_schema_columns_are_reported() {
        let csv = "product_name,standard_price\nA,10\n";
        let (_, report) = load_table(csv.as_bytes(), Mode::Historical).unwrap();
        assert!(report.missing_columns.contains(&"week".to_string()));
        assert!(report.missing_columns.contains(&"cogs".to_string()));
    }

    #[test]
    fn spreadsheet_extension_is_rejected() {
        let err = load_table_file("promo.xlsx", Mode::Grader).unwrap_err();
        assert!(err.to_string().contains("save the sheet as CSV"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_table_file("/nonexistent/promo.csv", Mode::Grader).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
