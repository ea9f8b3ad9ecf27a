use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::DEFAULT_SECRETS_FILE;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const CSV_PATH_PROMPT: &str = "Enter the full path to the CSV file: ";
pub const TABLE_NAME_PROMPT: &str = "Enter the table name: ";

#[derive(Parser, Debug)]
#[command(name = "sql-assistant")]
#[command(about = "Load CSV files into PostgreSQL and query them in plain language with Gemini")]
#[command(version)]
pub struct Cli {
    /// TOML file with database and Gemini settings
    #[arg(long, global = true, default_value = DEFAULT_SECRETS_FILE)]
    pub secrets: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a table from a CSV file and insert its rows
    Load {
        /// CSV file to load (prompted when omitted)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Target table name (prompted when omitted)
        #[arg(long)]
        table: Option<String>,

        /// Text encoding of the file, e.g. utf-8 or windows-1252
        #[arg(long, default_value = "utf-8")]
        encoding: String,

        #[arg(long, default_value = ",", value_parser = parse_delimiter)]
        delimiter: u8,

        /// Strip surrounding whitespace from every cell
        #[arg(long)]
        trim: bool,
    },
    /// Start the web chat UI
    Chat {
        #[arg(long, default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
    /// Manage the Gemini API key stored in the OS keychain
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyAction {
    Set { key: String },
    Delete,
}

fn parse_delimiter(value: &str) -> std::result::Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        _ => {
            let bytes = value.as_bytes();
            if bytes.len() == 1 {
                Ok(bytes[0])
            } else {
                Err(format!("delimiter must be a single byte, got '{}'", value))
            }
        }
    }
}

/// Print `message` and read one trimmed line from `input`
pub fn prompt_line<R: BufRead, W: Write>(input: &mut R, output: &mut W, message: &str) -> Result<String> {
    write!(output, "{}", message)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(AppError::ValidationError(format!(
            "No input given for '{}'",
            message.trim_end_matches(": ").trim()
        )));
    }
    Ok(line.trim().to_string())
}

pub fn prompt(message: &str) -> Result<String> {
    let stdin = io::stdin();
    prompt_line(&mut stdin.lock(), &mut io::stdout(), message)
}
