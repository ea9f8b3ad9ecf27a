pub mod chat;
pub mod column;
pub mod db_config;
pub mod error;
pub mod llm_config;
