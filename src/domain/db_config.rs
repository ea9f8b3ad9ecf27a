use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_PG_PORT: u16 = 5432;

/// PostgreSQL connection settings shared by the loader and the chat service.
///
/// Empty fields are left to the driver defaults when connecting, the chat
/// service rejects them up front via [`DbConfig::ensure_complete`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DbConfig {
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: String,
}

impl DbConfig {
    /// Names of the settings that are empty, using their environment keys
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("LOCAL_DBNAME", &self.dbname),
            ("LOCAL_DBPASS", &self.password),
            ("LOCAL_DBUSER", &self.user),
            ("LOCAL_DBHOST", &self.host),
            ("LOCAL_DBPORT", &self.port),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect()
    }

    pub fn ensure_complete(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::ConfigError(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn port_number(&self) -> Result<u16> {
        let port = self.port.trim();
        if port.is_empty() {
            return Ok(DEFAULT_PG_PORT);
        }
        port.parse::<u16>().map_err(|_| {
            AppError::ConfigError(format!("LOCAL_DBPORT is not a valid port: '{}'", port))
        })
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}
