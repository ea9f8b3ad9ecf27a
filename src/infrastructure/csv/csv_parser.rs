// ============================================================
// CSV PARSER
// ============================================================
// Decode CSV files with a configurable encoding and hand out
// record readers that treat the first column as the row key

use crate::domain::error::{AppError, Result};
use csv::{Reader, ReaderBuilder, StringRecord, StringRecordsIter, Trim};
use encoding_rs::{Encoding, UTF_8};
use std::path::Path;

/// CSV parser with explicit encoding
#[derive(Debug, Clone)]
pub struct CsvParser {
    /// Delimiter character (default: comma)
    delimiter: u8,

    /// Whether to trim whitespace from values
    trim: bool,

    /// Source encoding of the file (default: UTF-8)
    encoding: &'static Encoding,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: false,
            encoding: UTF_8,
        }
    }
}

impl CsvParser {
    /// Create a new CSV parser with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to trim whitespace
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Set the source encoding from a WHATWG label such as `utf-8` or `latin1`
    pub fn with_encoding(mut self, label: &str) -> Result<Self> {
        self.encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            AppError::ConfigError(format!("Unknown CSV encoding: '{}'", label))
        })?;
        Ok(self)
    }

    /// Read and decode a whole file
    pub fn read_file(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        self.decode(&bytes)
    }

    /// Decode raw bytes, rejecting sequences that are invalid for the encoding
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        let (content, _, had_errors) = self.encoding.decode(bytes);
        if had_errors {
            return Err(AppError::ParseError(format!(
                "CSV content is not valid {}",
                self.encoding.name()
            )));
        }
        Ok(content.into_owned())
    }

    /// Record reader over decoded content; the header is returned as the first record
    pub fn reader<'a>(&self, content: &'a str) -> Reader<&'a [u8]> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .flexible(true) // Arity is checked against the schema, not by the reader
            .has_headers(false)
            .from_reader(content.as_bytes())
    }

    /// Header row plus the first data row, both without the key column
    pub fn read_header_and_sample(&self, path: &Path) -> Result<(Vec<String>, Vec<String>)> {
        let content = self.read_file(path)?;
        self.header_and_sample(&content)
    }

    /// Same as [`Self::read_header_and_sample`] over already decoded content
    pub fn header_and_sample(&self, content: &str) -> Result<(Vec<String>, Vec<String>)> {
        let mut reader = self.reader(content);
        let mut records = reader.records();

        let header = next_record(&mut records, 0)?
            .ok_or_else(|| AppError::ValidationError("CSV file has no header row".to_string()))?;
        let sample = next_record(&mut records, 1)?.ok_or_else(|| {
            AppError::ValidationError("CSV file has no data row to infer types from".to_string())
        })?;

        Ok((drop_key_column(&header), drop_key_column(&sample)))
    }
}

/// Pull the next record, mapping reader failures to a parse error with its line
pub fn next_record(
    records: &mut StringRecordsIter<'_, &[u8]>,
    index: usize,
) -> Result<Option<StringRecord>> {
    match records.next() {
        None => Ok(None),
        Some(Ok(record)) => Ok(Some(record)),
        Some(Err(e)) => Err(AppError::ParseError(format!(
            "Failed to parse CSV record {}: {}",
            index + 1,
            e
        ))),
    }
}

/// Cells of a record with the first (key/index) column dropped
pub fn drop_key_column(record: &StringRecord) -> Vec<String> {
    record.iter().skip(1).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_reader_keeps_quoted_commas() {
        let parser = CsvParser::new();
        let content = "id,name,city\n1,\"Doe, Jane\",Paris\n";
        let mut reader = parser.reader(content);
        let records: Vec<StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(drop_key_column(&records[1]), vec!["Doe, Jane", "Paris"]);
    }

    #[test]
    fn test_header_and_sample_drop_first_column() {
        let file = write_temp(b"id,a,b\nk1,3,x\nk2,4,y\n");
        let (header, sample) = CsvParser::new()
            .read_header_and_sample(file.path())
            .unwrap();

        assert_eq!(header, vec!["a", "b"]);
        assert_eq!(sample, vec!["3", "x"]);
    }

    #[test]
    fn test_header_and_sample_from_content() {
        let (header, sample) = CsvParser::new()
            .header_and_sample("id,a,b\n\nk1,3,x\n")
            .unwrap();
        assert_eq!(header, vec!["a", "b"]);
        assert_eq!(sample, vec!["3", "x"]);
    }

    #[test]
    fn test_missing_data_row_is_rejected() {
        let file = write_temp(b"id,a,b\n");
        let err = CsvParser::new()
            .read_header_and_sample(file.path())
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_latin1_decoding() {
        let parser = CsvParser::new().with_encoding("latin1").unwrap();
        assert_eq!(parser.decode(b"caf\xe9").unwrap(), "café");
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_error() {
        let parser = CsvParser::new();
        assert!(matches!(parser.decode(b"caf\xe9"), Err(AppError::ParseError(_))));
    }

    #[test]
    fn test_unknown_encoding_label() {
        assert!(matches!(
            CsvParser::new().with_encoding("klingon"),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_custom_delimiter_and_trim() {
        let parser = CsvParser::new().with_delimiter(b';').with_trim(true);
        let mut reader = parser.reader("id; a ;b\n");
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(drop_key_column(&record), vec!["a", "b"]);
    }
}
