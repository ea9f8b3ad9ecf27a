//! Read-only checks for agent-generated SQL
//!
//! Secondary to the read-only transaction the query runs in: rejects
//! anything that is not a single SELECT/WITH statement before it reaches the
//! database, with a message the model can act on.

use crate::domain::error::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    "COPY", "MERGE", "CALL", "DO", "VACUUM", "REINDEX", "LOCK", "INTO",
];

static STRING_LITERAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*""#).unwrap());

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Ensure `sql` is a single read-only statement; returns it without a trailing semicolon
pub fn ensure_read_only(sql: &str) -> Result<String> {
    let statement = sql.trim().trim_end_matches(';').trim();
    if statement.is_empty() {
        return Err(AppError::ValidationError("Query is empty".to_string()));
    }

    // Literal contents and quoted identifiers may legitimately hold any keyword.
    let code = STRING_LITERAL_PATTERN.replace_all(statement, "''");

    if code.contains("--") || code.contains("/*") {
        return Err(AppError::ValidationError(
            "SQL comments are not allowed".to_string(),
        ));
    }

    if code.contains(';') {
        return Err(AppError::ValidationError(
            "Only a single SQL statement is allowed".to_string(),
        ));
    }

    let mut words = WORD_PATTERN
        .find_iter(&code)
        .map(|m| m.as_str().to_uppercase());

    match words.next().as_deref() {
        Some("SELECT") | Some("WITH") => {}
        _ => {
            return Err(AppError::ValidationError(
                "Only SELECT queries are allowed".to_string(),
            ))
        }
    }

    if let Some(keyword) = words.find(|w| FORBIDDEN_KEYWORDS.contains(&w.as_str())) {
        return Err(AppError::ValidationError(format!(
            "Query contains forbidden keyword: {}",
            keyword
        )));
    }

    Ok(statement.to_string())
}
