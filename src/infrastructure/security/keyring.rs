use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// Secrets stored in the OS keychain under one service name
pub struct KeyringManager {
    service: String,
}

impl KeyringManager {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry> {
        Entry::new(&self.service, account).map_err(|e| {
            AppError::SecurityError(format!("Failed to open keychain entry '{}': {}", account, e))
        })
    }

    pub fn set_secret(&self, account: &str, secret: &str) -> Result<()> {
        self.entry(account)?
            .set_password(secret)
            .map_err(|e| AppError::SecurityError(format!("Failed to store secret: {}", e)))
    }

    pub fn get_secret(&self, account: &str) -> Result<String> {
        self.entry(account)?
            .get_password()
            .map_err(|e| AppError::SecurityError(format!("Failed to read secret: {}", e)))
    }

    pub fn delete_secret(&self, account: &str) -> Result<()> {
        self.entry(account)?
            .delete_credential()
            .map_err(|e| AppError::SecurityError(format!("Failed to delete secret: {}", e)))
    }
}
