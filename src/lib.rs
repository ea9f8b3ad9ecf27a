mod application;
mod domain;
mod infrastructure;
mod interfaces;

use crate::application::use_cases::csv_import::ImportRequest;
use crate::application::use_cases::sql_agent::AgentToolConfig;
use crate::application::{CsvImportUseCase, GeminiSqlAgent};
use crate::domain::error::Result;
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::csv::CsvParser;
use crate::infrastructure::db::postgres::{DbConnectionConfig, PgDatabase};
use crate::infrastructure::db::SqlDatabase;
use crate::infrastructure::llm_clients::{GeminiClient, LLMClient};
use crate::interfaces::cli::{prompt, ApiKeyAction, Commands, CSV_PATH_PROMPT, TABLE_NAME_PROMPT};
use crate::interfaces::http::{start_server, AgentStatus, HttpState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub use crate::domain::error::AppError;
pub use crate::interfaces::cli::Cli;

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = ConfigService::load(&cli.secrets)?;

    match cli.command {
        Commands::Load {
            csv,
            table,
            encoding,
            delimiter,
            trim,
        } => {
            let csv_path = match csv {
                Some(path) => path,
                None => PathBuf::from(prompt(CSV_PATH_PROMPT)?),
            };
            let table_name = match table {
                Some(name) => name,
                None => prompt(TABLE_NAME_PROMPT)?,
            };
            let parser = CsvParser::new()
                .with_delimiter(delimiter)
                .with_trim(trim)
                .with_encoding(&encoding)?;

            let report = CsvImportUseCase::new(config.db_config(), parser)
                .execute(ImportRequest {
                    csv_path,
                    table_name,
                })
                .await?;
            info!(
                "Loaded {} rows into '{}' ({} columns)",
                report.rows_inserted,
                report.table_name,
                report.columns.len()
            );
            Ok(())
        }
        Commands::Chat { bind } => run_chat(&config, bind).await,
        Commands::ApiKey { action } => match action {
            ApiKeyAction::Set { key } => {
                config.save_api_key(&key)?;
                info!("Gemini API key stored in the OS keychain");
                Ok(())
            }
            ApiKeyAction::Delete => {
                config.delete_api_key()?;
                info!("Gemini API key removed from the OS keychain");
                Ok(())
            }
        },
    }
}

async fn build_agent(config: &ConfigService, tools: AgentToolConfig) -> Result<AgentStatus> {
    let db_config = config.db_config();
    db_config.ensure_complete()?;
    let llm_config = config.llm_config()?;

    let database: Arc<dyn SqlDatabase + Send + Sync> =
        Arc::new(PgDatabase::connect(&db_config, DbConnectionConfig::default()).await?);
    let llm_client: Arc<dyn LLMClient + Send + Sync> = Arc::new(GeminiClient::new());
    let sample_rows = tools.sample_rows;

    let agent = GeminiSqlAgent::new(llm_client, llm_config, database.clone(), tools);
    Ok(AgentStatus::Ready {
        agent: Arc::new(agent),
        database,
        sample_rows,
    })
}

async fn run_chat(config: &ConfigService, bind: SocketAddr) -> Result<()> {
    // The UI still starts without an agent and reports why.
    let status = match build_agent(config, AgentToolConfig::default()).await {
        Ok(status) => {
            info!("SQL agent initialized");
            status
        }
        Err(e) => {
            error!("Error initializing SQL agent: {}", e);
            AgentStatus::Failed(e.to_string())
        }
    };

    start_server(HttpState::new(status), bind)?.await?;
    Ok(())
}
