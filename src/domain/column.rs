use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage type inferred for a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Int,
    Float,
    Date,
    Varchar,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Int => "INT",
            SqlType::Float => "FLOAT",
            SqlType::Date => "DATE",
            SqlType::Varchar => "VARCHAR",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A single column of a table created from a CSV header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Header cell as it appears in the file
    pub raw_name: String,

    /// Identifier used in CREATE TABLE and INSERT
    pub name: String,

    pub sql_type: SqlType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_keywords() {
        assert_eq!(SqlType::Int.to_string(), "INT");
        assert_eq!(SqlType::Float.to_string(), "FLOAT");
        assert_eq!(SqlType::Date.to_string(), "DATE");
        assert_eq!(SqlType::Varchar.to_string(), "VARCHAR");
    }

    #[test]
    fn test_sql_type_serializes_uppercase() {
        let json = serde_json::to_string(&SqlType::Varchar).unwrap();
        assert_eq!(json, "\"VARCHAR\"");
    }
}
