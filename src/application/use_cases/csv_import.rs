use crate::application::use_cases::table_loader::{create_table_from_csv, insert_data_from_csv};
use crate::domain::column::ColumnDescriptor;
use crate::domain::db_config::DbConfig;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::db::postgres::{close_connection, connect_to_db};
use serde::Serialize;
use sqlx::{Connection, PgConnection};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub csv_path: PathBuf,
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub rows_inserted: u64,
}

/// One CSV load: fresh connection, CREATE + commit, INSERTs + commit, close.
pub struct CsvImportUseCase {
    db_config: DbConfig,
    parser: CsvParser,
}

impl CsvImportUseCase {
    pub fn new(db_config: DbConfig, parser: CsvParser) -> Self {
        Self { db_config, parser }
    }

    pub async fn execute(&self, request: ImportRequest) -> Result<ImportReport> {
        validate_request(&request)?;

        let mut conn = connect_to_db(&self.db_config).await?;
        info!("Connected to server");

        let outcome = self.load(&mut conn, &request).await;
        if let Err(e) = &outcome {
            error!("An unexpected error occurred: {}", e);
        }

        close_connection(conn).await;
        outcome
    }

    async fn load(&self, conn: &mut PgConnection, request: &ImportRequest) -> Result<ImportReport> {
        let mut tx = conn
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        let schema =
            create_table_from_csv(&mut *tx, &request.table_name, &request.csv_path, &self.parser)
                .await?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit table creation: {}", e)))?;

        let mut tx = conn
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;
        let rows_inserted =
            insert_data_from_csv(&mut *tx, &request.table_name, &request.csv_path, &self.parser)
                .await?;
        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit inserted rows: {}", e)))?;

        Ok(ImportReport {
            table_name: schema.name,
            columns: schema.columns,
            rows_inserted,
        })
    }
}

fn validate_request(request: &ImportRequest) -> Result<()> {
    if request.table_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Table name must not be empty".to_string(),
        ));
    }
    if !request.csv_path.is_file() {
        return Err(AppError::IoError(format!(
            "CSV file not found: {}",
            request.csv_path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_name_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let request = ImportRequest {
            csv_path: file.path().to_path_buf(),
            table_name: "  ".to_string(),
        };
        assert!(matches!(
            validate_request(&request),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let request = ImportRequest {
            csv_path: PathBuf::from("/definitely/not/here.csv"),
            table_name: "sales".to_string(),
        };
        assert!(matches!(validate_request(&request), Err(AppError::IoError(_))));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_connecting() {
        let use_case = CsvImportUseCase::new(DbConfig::default(), CsvParser::new());
        let result = use_case
            .execute(ImportRequest {
                csv_path: PathBuf::from("/definitely/not/here.csv"),
                table_name: "sales".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::IoError(_))));
    }
}
