//! Reads registration exports (CSV or TSV) into raw header/value rows.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::attendee::AttendeeRecord;
use crate::reconcile::normalizer::normalize_row;

#[derive(Debug, Error)]
pub enum CsvSourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("file has no header row")]
    MissingHeader,
}

/// Header row plus data rows as `(header, value)` pairs.
#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<(String, String)>>,
}

impl CsvTable {
    pub fn normalize(&self) -> Vec<AttendeeRecord> {
        self.rows.iter().map(|row| normalize_row(row)).collect()
    }
}

/// Tab when the header line has more tabs than commas, comma otherwise.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let tabs = header.matches('\t').count();
    let commas = header.matches(',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

pub fn parse_csv(text: &str) -> Result<CsvTable, CsvSourceError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(text))
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvSourceError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let row: Vec<(String, String)> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }

    Ok(CsvTable { headers, rows })
}

/// Bytes that are not valid UTF-8 (Latin-1 or Windows-1252 exports) become U+FFFD
/// in the affected cell; the rest of the file still imports.
pub fn read_csv_file(path: &Path) -> Result<CsvTable, CsvSourceError> {
    let bytes = std::fs::read(path).map_err(|source| CsvSourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv(&String::from_utf8_lossy(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_tab_delimiter() {
        assert_eq!(detect_delimiter("Email\tFirst Name\nx@y\tA"), b'\t');
        assert_eq!(detect_delimiter("Email,First Name\nx@y,A"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn test_parse_comma_file() {
        let table = parse_csv(
            "Email Address,First Name,Notes\n\
             a@b.com,A,\"likes, commas\"\n\
             ,,\n\
             c@d.com,C\n",
        )
        .unwrap();
        assert_eq!(table.headers, vec!["Email Address", "First Name", "Notes"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2].1, "likes, commas");
        assert_eq!(table.rows[1][2], ("Notes".to_string(), String::new()));
    }

    #[test]
    fn test_parse_tsv_with_bom() {
        let table = parse_csv("\u{feff}Email\tFirst Name\na@b.com\tA, Jr.\n").unwrap();
        let records = table.normalize();
        assert_eq!(records[0].email_address.as_deref(), Some("a@b.com"));
        assert_eq!(records[0].first_name.as_deref(), Some("A, Jr."));
    }

    #[test]
    fn test_read_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Email,First Name").unwrap();
        writeln!(file, "x@y.org,X").unwrap();
        let table = read_csv_file(file.path()).unwrap();
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_read_non_utf8_file_keeps_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Email,First Name\nj@x.com,Jos\xe9\nk@x.com,Kim\n")
            .unwrap();
        let records = read_csv_file(file.path()).unwrap().normalize();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].email_address.as_deref(), Some("j@x.com"));
        assert_eq!(records[0].first_name.as_deref(), Some("Jos\u{fffd}"));
        assert_eq!(records[1].first_name.as_deref(), Some("Kim"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_csv_file(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, CsvSourceError::Io { .. }));
    }
}
