//! PostgreSQL access for the loader and the chat agent.
//!
//! The loader works on a single `PgConnection` per run; the agent shares a
//! small pool and runs every query inside a read-only transaction.

use super::{render_value, QueryResult, SqlDatabase, StatementExecutor};
use crate::domain::db_config::DbConfig;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Column, Connection, PgConnection, Pool, Postgres, Row};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for the agent's connection pool
#[derive(Debug, Clone)]
pub struct DbConnectionConfig {
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Query timeout in seconds
    pub query_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for DbConnectionConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            connect_timeout_secs: 10,
            query_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// Connection options from explicit settings; empty fields fall back to driver defaults
pub fn build_pg_options(config: &DbConfig) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::new().port(config.port_number()?);

    if !config.host.trim().is_empty() {
        options = options.host(config.host.trim());
    }
    if !config.dbname.trim().is_empty() {
        options = options.database(config.dbname.trim());
    }
    if !config.user.trim().is_empty() {
        options = options.username(config.user.trim());
    }
    if !config.password.is_empty() {
        options = options.password(&config.password);
    }

    Ok(options)
}

/// Open the single connection used by one CSV load
pub async fn connect_to_db(config: &DbConfig) -> Result<PgConnection> {
    let options = build_pg_options(config)?;

    match PgConnection::connect_with(&options).await {
        Ok(conn) => {
            info!("Connected to the database.");
            Ok(conn)
        }
        Err(e) => {
            error!("Error connecting to the database: {}", e);
            Err(AppError::DatabaseError(format!(
                "Failed to connect to PostgreSQL: {}",
                e
            )))
        }
    }
}

pub async fn close_connection(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("Error while closing the database connection: {}", e);
    }
    info!("Database connection closed.");
}

#[async_trait]
impl StatementExecutor for PgConnection {
    async fn execute_statement(&mut self, sql: &str, params: &[String]) -> Result<u64> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.as_str());
        }

        let result = query
            .execute(&mut *self)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Statement failed: {}", e)))?;

        Ok(result.rows_affected())
    }
}

/// Pooled, read-only database handle for the SQL agent
pub struct PgDatabase {
    pool: Pool<Postgres>,
    config: DbConnectionConfig,
}

impl PgDatabase {
    pub async fn connect(db_config: &DbConfig, config: DbConnectionConfig) -> Result<Self> {
        let options = build_pg_options(db_config)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                AppError::DatabaseError(format!("Database connection failed: {}", e))
            })?;

        info!(
            "Created PostgreSQL connection pool for '{}' (host: {})",
            db_config.dbname, db_config.host
        );

        Ok(Self { pool, config })
    }

    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(Duration::from_secs(self.config.query_timeout_secs), fut)
            .await
            .map_err(|_| {
                AppError::DatabaseError(format!(
                    "{} timed out after {} seconds",
                    what, self.config.query_timeout_secs
                ))
            })?
            .map_err(|e| AppError::DatabaseError(format!("{} failed: {}", what, e)))
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let query = r#"
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'public'
                AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;

        let rows = self
            .with_timeout("Table listing", sqlx::query(query).fetch_all(&self.pool))
            .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("table_name").map_err(|e| {
                    AppError::DatabaseError(format!("Failed to parse table_name: {}", e))
                })
            })
            .collect()
    }

    async fn list_columns(&self, table_name: &str) -> Result<Vec<(String, String)>> {
        let query = r#"
            SELECT column_name::text AS column_name, data_type::text AS data_type
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = self
            .with_timeout(
                "Column listing",
                sqlx::query(query).bind(table_name).fetch_all(&self.pool),
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let column_name: String = row.try_get("column_name").map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse column_name: {}", e))
            })?;
            let data_type: String = row.try_get("data_type").map_err(|e| {
                AppError::DatabaseError(format!("Failed to parse data_type: {}", e))
            })?;
            columns.push((column_name, data_type));
        }
        Ok(columns)
    }

    async fn sample_rows(&self, table_name: &str, limit: usize) -> Result<Vec<Vec<String>>> {
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table_name), limit);
        let rows = self
            .with_timeout("Sample query", sqlx::query(&sql).fetch_all(&self.pool))
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| render_value(&extract_column_value(row, i)))
                    .collect()
            })
            .collect())
    }
}

#[async_trait]
impl SqlDatabase for PgDatabase {
    async fn table_info(&self, sample_rows: usize) -> Result<String> {
        let tables = self.list_tables().await?;
        let mut sections = Vec::with_capacity(tables.len());

        for table in &tables {
            let columns = self.list_columns(table).await?;
            let samples = if sample_rows > 0 {
                self.sample_rows(table, sample_rows).await?
            } else {
                Vec::new()
            };
            sections.push(render_table_info(table, &columns, &samples));
        }

        info!("Collected table info for {} tables", tables.len());
        Ok(sections.join("\n\n"))
    }

    async fn run_query(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        debug!("Running agent query: {}", sql);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open transaction: {}", e)))?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to set read-only mode: {}", e)))?;

        // One row past the limit tells whether anything was cut off.
        let fetched: Vec<PgRow> = tokio::time::timeout(
            Duration::from_secs(self.config.query_timeout_secs),
            sqlx::query(sql)
                .fetch(&mut *tx)
                .take(max_rows.saturating_add(1))
                .try_collect(),
        )
        .await
        .map_err(|_| {
            AppError::DatabaseError(format!(
                "Query timed out after {} seconds",
                self.config.query_timeout_secs
            ))
        })?
        .map_err(|e| AppError::DatabaseError(format!("Query execution failed: {}", e)))?;

        // Nothing to keep from a read-only transaction.
        if let Err(e) = tx.rollback().await {
            warn!("Failed to roll back read-only transaction: {}", e);
        }

        let (rows, truncated) = split_at_limit(fetched, max_rows);
        Ok(rows_to_result(&rows, truncated))
    }
}

/// Keep at most `max_rows` items, reporting whether any were dropped
fn split_at_limit<T>(mut rows: Vec<T>, max_rows: usize) -> (Vec<T>, bool) {
    let truncated = rows.len() > max_rows;
    rows.truncate(max_rows);
    (rows, truncated)
}

fn rows_to_result(rows: &[PgRow], truncated: bool) -> QueryResult {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let kept: Vec<Vec<serde_json::Value>> = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|i| extract_column_value(row, i))
                .collect()
        })
        .collect();

    QueryResult {
        columns,
        row_count: kept.len(),
        truncated,
        rows: kept,
    }
}

/// Extract a column value from a row as serde_json::Value
fn extract_column_value(row: &PgRow, index: usize) -> serde_json::Value {
    // Try different types in order of likelihood
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return v
            .map(|n| serde_json::Value::Number(n.into()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return v
            .and_then(|n| serde_json::Number::from_f64(n as f64))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<sqlx::types::BigDecimal>, _>(index) {
        return v
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v
            .map(serde_json::Value::Bool)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
        return v
            .map(|dt| serde_json::Value::String(dt.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
        return v
            .map(|dt| serde_json::Value::String(dt.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
        return v
            .map(|d| serde_json::Value::String(d.to_string()))
            .unwrap_or(serde_json::Value::Null);
    }

    // Default to null for unsupported types
    serde_json::Value::Null
}

/// Double-quote an identifier for PostgreSQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// CREATE TABLE statement followed by a commented block of sample rows
pub fn render_table_info(
    table: &str,
    columns: &[(String, String)],
    samples: &[Vec<String>],
) -> String {
    let column_lines: Vec<String> = columns
        .iter()
        .map(|(name, data_type)| format!("\t{} {}", name, data_type))
        .collect();
    let mut out = format!("CREATE TABLE {} (\n{}\n)", table, column_lines.join(",\n"));

    if !samples.is_empty() {
        let header: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        out.push_str(&format!(
            "\n\n/*\n{} rows from {} table:\n{}",
            samples.len(),
            table,
            header.join("\t")
        ));
        for row in samples {
            out.push('\n');
            out.push_str(&row.join("\t"));
        }
        out.push_str("\n*/");
    }

    out
}
