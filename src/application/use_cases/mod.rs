pub mod chat_session;
pub mod column_normalizer;
pub mod csv_import;
pub mod sql_agent;
pub mod sql_guard;
pub mod table_loader;
pub mod type_inferrer;
