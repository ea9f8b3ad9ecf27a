use crate::domain::db_config::DbConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::security::keyring::KeyringManager;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";

const KEYRING_SERVICE: &str = "SqlAssistant";
const GOOGLE_PROVIDER: &str = "google";

const SETTING_KEYS: &[&str] = &[
    "LOCAL_DBNAME",
    "LOCAL_DBUSER",
    "LOCAL_DBPASS",
    "LOCAL_DBHOST",
    "LOCAL_DBPORT",
    "GOOGLE_API_KEY",
    "GEMINI_MODEL",
    "GEMINI_BASE_URL",
];

/// TOML and environment both yield typed scalars (`LOCAL_DBPORT = 5432`),
/// all settings are consumed as text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SettingValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Text(s) => write!(f, "{}", s),
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Float(n) => write!(f, "{}", n),
            SettingValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Settings {
    #[serde(rename = "LOCAL_DBNAME")]
    dbname: Option<SettingValue>,
    #[serde(rename = "LOCAL_DBUSER")]
    user: Option<SettingValue>,
    #[serde(rename = "LOCAL_DBPASS")]
    password: Option<SettingValue>,
    #[serde(rename = "LOCAL_DBHOST")]
    host: Option<SettingValue>,
    #[serde(rename = "LOCAL_DBPORT")]
    port: Option<SettingValue>,
    #[serde(rename = "GOOGLE_API_KEY")]
    google_api_key: Option<SettingValue>,
    #[serde(rename = "GEMINI_MODEL")]
    gemini_model: Option<SettingValue>,
    #[serde(rename = "GEMINI_BASE_URL")]
    gemini_base_url: Option<SettingValue>,
}

fn text(value: &Option<SettingValue>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string().trim().to_string())
        .unwrap_or_default()
}

/// Secrets file overlaid with the process environment.
///
/// Environment values go in as the exact strings given, so `LOCAL_DBPASS=007`
/// is not read back as the number 7.
pub fn settings_figment(secrets_path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(secrets_path))
        .merge(Serialized::defaults(environment_settings()))
}

fn environment_settings() -> BTreeMap<String, String> {
    SETTING_KEYS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect()
}

/// Passwords are used verbatim, surrounding whitespace included
fn raw(value: &Option<SettingValue>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

/// Database and model settings: secrets file, then environment, then keychain
pub struct ConfigService {
    settings: Settings,
    keyring: KeyringManager,
}

impl ConfigService {
    /// Load `.env`, then merge `secrets_path` with the process environment
    pub fn load(secrets_path: &Path) -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_figment(settings_figment(secrets_path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to read settings: {}", e)))?;
        Ok(Self {
            settings,
            keyring: KeyringManager::new(KEYRING_SERVICE),
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            dbname: text(&self.settings.dbname),
            user: text(&self.settings.user),
            password: raw(&self.settings.password),
            host: text(&self.settings.host),
            port: text(&self.settings.port),
        }
    }

    /// Gemini settings; the API key falls back to the OS keychain
    pub fn llm_config(&self) -> Result<LLMConfig> {
        let mut config = LLMConfig::default();

        let model = text(&self.settings.gemini_model);
        if !model.is_empty() {
            config.model = model;
        }
        let base_url = text(&self.settings.gemini_base_url);
        if !base_url.is_empty() {
            config.base_url = base_url;
        }

        let api_key = text(&self.settings.google_api_key);
        let api_key = if api_key.is_empty() {
            self.keyring.get_secret(GOOGLE_PROVIDER).map_err(|e| {
                AppError::ConfigError(format!(
                    "GOOGLE_API_KEY is not set and no key is stored in the keychain ({})",
                    e
                ))
            })?
        } else {
            api_key
        };
        config.api_key = Some(api_key);

        Ok(config)
    }

    pub fn save_api_key(&self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(AppError::ValidationError("API key must not be empty".to_string()));
        }
        self.keyring.set_secret(GOOGLE_PROVIDER, key.trim())
    }

    pub fn delete_api_key(&self) -> Result<()> {
        self.keyring.delete_secret(GOOGLE_PROVIDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(toml: &str) -> ConfigService {
        ConfigService::from_figment(Figment::new().merge(Toml::string(toml))).unwrap()
    }

    #[test]
    fn test_db_config_from_toml() {
        let config = service(
            r#"
            LOCAL_DBNAME = "shop"
            LOCAL_DBUSER = "admin"
            LOCAL_DBPASS = "secret"
            LOCAL_DBHOST = "localhost"
            LOCAL_DBPORT = 5433
            "#,
        )
        .db_config();

        assert_eq!(config.dbname, "shop");
        assert_eq!(config.user, "admin");
        assert_eq!(config.password, "secret");
        assert_eq!(config.port, "5433");
        assert!(config.missing_fields().is_empty());
    }

    #[test]
    fn test_missing_settings_stay_empty() {
        let config = service(r#"LOCAL_DBNAME = "shop""#).db_config();
        assert_eq!(
            config.missing_fields(),
            vec!["LOCAL_DBPASS", "LOCAL_DBUSER", "LOCAL_DBHOST", "LOCAL_DBPORT"]
        );
    }

    #[test]
    fn test_llm_config_overrides() {
        let config = service(
            r#"
            GOOGLE_API_KEY = "abc123"
            GEMINI_MODEL = "gemini-1.5-pro"
            "#,
        )
        .llm_config()
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.model, "gemini-1.5-pro");
        assert_eq!(config.base_url, crate::domain::llm_config::DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn test_later_providers_win() {
        let figment = Figment::new()
            .merge(Toml::string(r#"LOCAL_DBHOST = "db.internal""#))
            .merge(Toml::string(r#"LOCAL_DBHOST = "127.0.0.1""#));
        let config = ConfigService::from_figment(figment).unwrap().db_config();
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_blank_api_key_is_rejected() {
        assert!(matches!(
            service("").save_api_key("  "),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_environment_overrides_secrets_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "secrets.toml",
                r#"
                LOCAL_DBHOST = "db.internal"
                LOCAL_DBNAME = "shop"
                LOCAL_DBPORT = 5432
                "#,
            )?;
            jail.set_env("LOCAL_DBHOST", "dbhost");
            jail.set_env("LOCAL_DBPASS", "007");
            jail.set_env("LOCAL_DBPORT", "6543");
            jail.set_env("GOOGLE_API_KEY", "from-env");
            jail.set_env("GEMINI_MODEL", "gemini-1.5-pro");

            let service =
                ConfigService::from_figment(settings_figment(Path::new("secrets.toml"))).unwrap();
            let db = service.db_config();
            assert_eq!(db.host, "dbhost");
            assert_eq!(db.dbname, "shop");
            assert_eq!(db.password, "007");
            assert_eq!(db.port, "6543");

            let llm = service.llm_config().unwrap();
            assert_eq!(llm.api_key.as_deref(), Some("from-env"));
            assert_eq!(llm.model, "gemini-1.5-pro");
            Ok(())
        });
    }
}
