pub mod postgres;

use crate::domain::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Executes a single parameterized statement. Parameters are bound as text.
#[async_trait]
pub trait StatementExecutor {
    async fn execute_statement(&mut self, sql: &str, params: &[String]) -> Result<u64>;
}

/// Read-only view of a database, as used by the SQL agent
#[async_trait]
pub trait SqlDatabase {
    /// CREATE TABLE statements plus `sample_rows` example rows for every table
    async fn table_info(&self, sample_rows: usize) -> Result<String>;

    /// Run a SELECT and return at most `max_rows` rows
    async fn run_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult>;
}

/// Result of executing a query
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    /// Set when rows beyond the requested maximum were dropped
    pub truncated: bool,
}

impl QueryResult {
    /// Tab-separated rendering for prompts
    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "No results found.".to_string();
        }

        let mut out = self.columns.join("\t");
        for row in &self.rows {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(render_value).collect();
            out.push_str(&cells.join("\t"));
        }
        if self.truncated {
            out.push_str(&format!("\n(showing first {} rows)", self.rows.len()));
        }
        out
    }
}

pub fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
