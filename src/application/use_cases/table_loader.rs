//! Table Loader
//!
//! Creates a table from the inferred CSV schema and streams every data row
//! into it with one parameterized INSERT per row. Identifiers are used as
//! normalized, unquoted; the table name is used as given.

use crate::application::use_cases::type_inferrer::{infer_column_types, infer_schema};
use crate::domain::column::{SqlType, TableSchema};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::csv::{drop_key_column, next_record, CsvParser};
use crate::infrastructure::db::StatementExecutor;
use std::path::Path;
use tracing::info;

/// `CREATE TABLE IF NOT EXISTS` with one `<name> <TYPE>` entry per column
pub fn build_create_table_sql(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.sql_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE IF NOT EXISTS {} ({});", schema.name, columns)
}

/// Parameterized INSERT; each text parameter is cast to its column type by the server
pub fn build_insert_sql(table_name: &str, columns: &[String], types: &[SqlType]) -> String {
    let placeholders = types
        .iter()
        .enumerate()
        .map(|(idx, sql_type)| format!("${}::{}", idx + 1, sql_type))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table_name,
        columns.join(", "),
        placeholders
    )
}

/// Create the table for a CSV file and return the schema used
pub async fn create_table_from_csv<E>(
    executor: &mut E,
    table_name: &str,
    csv_path: &Path,
    parser: &CsvParser,
) -> Result<TableSchema>
where
    E: StatementExecutor + Send + ?Sized,
{
    let schema = infer_schema(table_name, csv_path, parser)?;
    let create_table_query = build_create_table_sql(&schema);

    info!("Creating table with query: {}", create_table_query);
    executor.execute_statement(&create_table_query, &[]).await?;
    info!(
        "Table '{}' created successfully with columns: {:?}",
        table_name,
        schema.column_names()
    );

    Ok(schema)
}

/// Insert every data row of a CSV file, returning the number of INSERTs executed.
///
/// The file is read once; its header is normalized and typed the same way as
/// in [`create_table_from_csv`], so both statements agree on the column list
/// and its order.
pub async fn insert_data_from_csv<E>(
    executor: &mut E,
    table_name: &str,
    csv_path: &Path,
    parser: &CsvParser,
) -> Result<u64>
where
    E: StatementExecutor + Send + ?Sized,
{
    let content = parser.read_file(csv_path)?;
    let (formatted_header, column_types): (Vec<String>, Vec<SqlType>) =
        infer_column_types(&content, parser)?
            .into_iter()
            .map(|c| (c.name, c.sql_type))
            .unzip();
    let insert_query = build_insert_sql(table_name, &formatted_header, &column_types);
    let expected = formatted_header.len();

    let mut reader = parser.reader(&content);
    let mut records = reader.records();

    // Skip the header row
    next_record(&mut records, 0)?;

    let mut inserted = 0u64;
    let mut index = 1;
    while let Some(record) = next_record(&mut records, index)? {
        let row = drop_key_column(&record);
        if row.len() != expected {
            return Err(AppError::DatabaseError(format!(
                "Row {} has {} values but table '{}' has {} columns",
                index,
                row.len(),
                table_name,
                expected
            )));
        }

        executor
            .execute_statement(&insert_query, &row)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Insert of row {} failed: {}", index, e)))?;
        inserted += 1;
        index += 1;
    }

    info!("Data inserted into table '{}' successfully.", table_name);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::column::ColumnDescriptor;
    use async_trait::async_trait;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingExecutor {
        statements: Vec<(String, Vec<String>)>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl StatementExecutor for RecordingExecutor {
        async fn execute_statement(&mut self, sql: &str, params: &[String]) -> Result<u64> {
            if self.fail_on_call == Some(self.statements.len()) {
                return Err(AppError::DatabaseError(
                    "invalid input syntax for type integer".to_string(),
                ));
            }
            self.statements.push((sql.to_string(), params.to_vec()));
            Ok(1)
        }
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SALES_CSV: &str = "id,Units,Price %,Sold On,City\n\
        1,3,4.5,2021-01-01,Paris\n\
        2,7,1.25,2021-02-11,Lyon\n\
        3,1,9.0,2021-03-30,Nice\n";

    #[test]
    fn test_create_table_sql() {
        let schema = TableSchema {
            name: "sales".to_string(),
            columns: vec![
                ColumnDescriptor {
                    raw_name: "Units".to_string(),
                    name: "units".to_string(),
                    sql_type: SqlType::Int,
                },
                ColumnDescriptor {
                    raw_name: "City".to_string(),
                    name: "city".to_string(),
                    sql_type: SqlType::Varchar,
                },
            ],
        };
        assert_eq!(
            build_create_table_sql(&schema),
            "CREATE TABLE IF NOT EXISTS sales (units INT, city VARCHAR);"
        );
    }

    #[test]
    fn test_insert_sql_casts_placeholders() {
        let sql = build_insert_sql(
            "sales",
            &["units".to_string(), "sold_on".to_string()],
            &[SqlType::Int, SqlType::Date],
        );
        assert_eq!(
            sql,
            "INSERT INTO sales (units, sold_on) VALUES ($1::INT, $2::DATE)"
        );
    }

    #[tokio::test]
    async fn test_one_insert_per_data_row_after_create() {
        let file = write_csv(SALES_CSV);
        let parser = CsvParser::new();
        let mut executor = RecordingExecutor::default();

        let schema = create_table_from_csv(&mut executor, "sales", file.path(), &parser)
            .await
            .unwrap();
        let inserted = insert_data_from_csv(&mut executor, &schema.name, file.path(), &parser)
            .await
            .unwrap();

        assert_eq!(inserted, 3);
        assert_eq!(executor.statements.len(), 4);

        let (create_sql, create_params) = &executor.statements[0];
        assert_eq!(
            create_sql,
            "CREATE TABLE IF NOT EXISTS sales (units INT, price_percent FLOAT, sold_on DATE, city VARCHAR);"
        );
        assert!(create_params.is_empty());

        for (sql, _) in &executor.statements[1..] {
            assert_eq!(
                sql,
                "INSERT INTO sales (units, price_percent, sold_on, city) VALUES ($1::INT, $2::FLOAT, $3::DATE, $4::VARCHAR)"
            );
        }
        assert_eq!(
            executor.statements[2].1,
            vec!["7", "1.25", "2021-02-11", "Lyon"]
        );
    }

    #[tokio::test]
    async fn test_arity_mismatch_aborts_remaining_rows() {
        let file = write_csv("id,a,b\n1,x,y\n2,only\n3,p,q\n");
        let parser = CsvParser::new();
        let mut executor = RecordingExecutor::default();

        let schema = create_table_from_csv(&mut executor, "t", file.path(), &parser)
            .await
            .unwrap();
        let err = insert_data_from_csv(&mut executor, &schema.name, file.path(), &parser)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DatabaseError(ref msg) if msg.starts_with("Row 2 has 1 values")));
        // CREATE plus the first row only
        assert_eq!(executor.statements.len(), 2);
    }

    #[tokio::test]
    async fn test_database_error_aborts_load() {
        let file = write_csv("id,n\n1,5\n2,five\n3,6\n");
        let parser = CsvParser::new();
        let mut executor = RecordingExecutor {
            fail_on_call: Some(2),
            ..Default::default()
        };

        let schema = create_table_from_csv(&mut executor, "t", file.path(), &parser)
            .await
            .unwrap();
        let err = insert_data_from_csv(&mut executor, &schema.name, file.path(), &parser)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Insert of row 2 failed"));
        assert_eq!(executor.statements.len(), 2);
    }
}
