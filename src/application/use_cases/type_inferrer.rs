//! Column type inference from the first data row of a CSV file.
//!
//! Only one sample row is inspected. A column whose first value looks numeric
//! but later holds text gets a numeric type and fails at insert time.

use crate::application::use_cases::column_normalizer::normalize_headers;
use crate::domain::column::{ColumnDescriptor, SqlType, TableSchema};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::CsvParser;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::debug;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d.%m.%Y",
    "%m/%d/%y",
    "%d/%m/%y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d-%b-%Y",
    "%a, %d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

/// Classify one sample value: INT, then FLOAT, then DATE, else VARCHAR
pub fn classify_value(value: &str) -> SqlType {
    if is_int(value) {
        SqlType::Int
    } else if is_float(value) {
        SqlType::Float
    } else if is_date(value) {
        SqlType::Date
    } else {
        SqlType::Varchar
    }
}

fn is_int(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn is_float(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

/// Permissive date check across common day/month/year orders and timestamp layouts
pub fn is_date(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
        || DateTime::parse_from_rfc2822(value).is_ok()
}

/// Classify every sample cell; cells missing from a short sample row count as empty
pub fn classify_row(header_len: usize, sample: &[String]) -> Vec<SqlType> {
    (0..header_len)
        .map(|idx| classify_value(sample.get(idx).map(String::as_str).unwrap_or("")))
        .collect()
}

/// Column descriptors for decoded CSV content, first column excluded.
///
/// Raw header cells are kept next to their normalized names.
pub fn infer_column_types(content: &str, parser: &CsvParser) -> Result<Vec<ColumnDescriptor>> {
    let (raw_header, sample) = parser.header_and_sample(content)?;
    if raw_header.is_empty() {
        return Err(AppError::ValidationError(
            "CSV file has no data columns after dropping the first column".to_string(),
        ));
    }

    let types = classify_row(raw_header.len(), &sample);
    let names = normalize_headers(&raw_header);

    Ok(raw_header
        .into_iter()
        .zip(names)
        .zip(types)
        .map(|((raw_name, name), sql_type)| ColumnDescriptor {
            raw_name,
            name,
            sql_type,
        })
        .collect())
}

/// Full table schema for a CSV file; the file is read and decoded once
pub fn infer_schema(table_name: &str, csv_path: &Path, parser: &CsvParser) -> Result<TableSchema> {
    let content = parser.read_file(csv_path)?;
    let columns = infer_column_types(&content, parser)?;
    debug!(
        "Inferred {} columns from {}: {:?}",
        columns.len(),
        csv_path.display(),
        columns.iter().map(|c| c.sql_type).collect::<Vec<_>>()
    );

    Ok(TableSchema {
        name: table_name.to_string(),
        columns,
    })
}
