use crate::application::use_cases::sql_guard::ensure_read_only;
use crate::domain::chat::{AgentAnswer, AgentQuery};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::db::{QueryResult, SqlDatabase};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, extract_sql};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Answers natural-language questions about the connected database
#[async_trait]
pub trait SqlAgent {
    async fn ask(&self, query: &AgentQuery) -> Result<AgentAnswer>;
}

#[derive(Debug, Clone)]
pub struct AgentToolConfig {
    /// Attempts at producing an executable query before giving up
    pub max_iterations: usize,
    /// Example rows per table included with the schema
    pub sample_rows: usize,
    pub max_result_rows: usize,
    pub verbose: bool,
}

impl Default for AgentToolConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            sample_rows: 3,
            max_result_rows: 50,
            verbose: true,
        }
    }
}

const SQL_SYSTEM_PROMPT: &str = r#"You are a PostgreSQL expert. Given a question about the database below, write ONE syntactically correct PostgreSQL query that answers it.

Rules:
- Only read data: a single SELECT (or WITH ... SELECT) statement.
- Only use tables and columns that appear in the schema.
- Unless the question asks for a specific number of rows, limit the result to at most {max_rows} rows.
- Wrap the query in a ```sql fenced code block and write nothing else.

Database schema:
{schema}"#;

const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful database assistant. Answer the user's question in plain language using only the SQL result provided. If the result is empty, say that no matching data was found. Do not mention SQL unless asked.";

pub struct GeminiSqlAgent {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
    database: Arc<dyn SqlDatabase + Send + Sync>,
    tools: AgentToolConfig,
}

impl GeminiSqlAgent {
    pub fn new(
        llm_client: Arc<dyn LLMClient + Send + Sync>,
        config: LLMConfig,
        database: Arc<dyn SqlDatabase + Send + Sync>,
        tools: AgentToolConfig,
    ) -> Self {
        Self {
            llm_client,
            config,
            database,
            tools,
        }
    }

    fn sql_system_prompt(&self, schema: &str) -> String {
        SQL_SYSTEM_PROMPT
            .replace("{max_rows}", &self.tools.max_result_rows.to_string())
            .replace("{schema}", schema)
    }

    /// Ask for SQL until one executes, feeding each failure back to the model
    async fn query_with_retries(&self, question: &str, schema: &str) -> Result<(String, QueryResult)> {
        let system_prompt = self.sql_system_prompt(schema);
        let mut feedback: Vec<String> = Vec::new();
        let mut last_problem = String::from("no attempt was made");

        for attempt in 1..=self.tools.max_iterations {
            let user_prompt = build_sql_user_prompt(question, &feedback);
            let reply = self
                .llm_client
                .generate(&self.config, &system_prompt, &user_prompt)
                .await?;

            let problem = match extract_sql(&reply) {
                None => "The reply did not contain a SQL query in a ```sql block.".to_string(),
                Some(candidate) => match ensure_read_only(&candidate) {
                    Err(e) => format!("Query `{}` was rejected: {}", candidate, e),
                    Ok(sql) => {
                        if self.tools.verbose {
                            info!("Agent attempt {}: executing {}", attempt, sql);
                        }
                        match self
                            .database
                            .run_query(&sql, self.tools.max_result_rows)
                            .await
                        {
                            Ok(result) => return Ok((sql, result)),
                            Err(e) => format!("Query `{}` failed: {}", sql, e),
                        }
                    }
                },
            };

            warn!("Agent attempt {} failed: {}", attempt, problem);
            feedback.push(problem.clone());
            last_problem = problem;
        }

        Err(AppError::LLMError(format!(
            "Agent stopped after {} attempts: {}",
            self.tools.max_iterations, last_problem
        )))
    }
}

fn build_sql_user_prompt(question: &str, feedback: &[String]) -> String {
    let mut prompt = format!("Question: {}", question.trim());
    if !feedback.is_empty() {
        prompt.push_str("\n\nPrevious attempts failed:");
        for (i, problem) in feedback.iter().enumerate() {
            prompt.push_str(&format!("\n{}. {}", i + 1, problem));
        }
        prompt.push_str("\n\nWrite a corrected query.");
    }
    prompt
}

fn build_answer_user_prompt(question: &str, sql: &str, result: &QueryResult) -> String {
    format!(
        "Question: {}\n\nSQL query:\n{}\n\nSQL result:\n{}",
        question.trim(),
        sql,
        result.to_text()
    )
}

#[async_trait]
impl SqlAgent for GeminiSqlAgent {
    async fn ask(&self, query: &AgentQuery) -> Result<AgentAnswer> {
        let schema = self.database.table_info(self.tools.sample_rows).await?;
        if self.tools.verbose {
            info!("Agent received question: {}", query.query);
        }

        let (sql, result) = self.query_with_retries(&query.query, &schema).await?;
        if self.tools.verbose {
            info!("Agent query returned {} rows", result.row_count);
        }

        let reply = self
            .llm_client
            .generate(
                &self.config,
                ANSWER_SYSTEM_PROMPT,
                &build_answer_user_prompt(&query.query, &sql, &result),
            )
            .await?;

        Ok(AgentAnswer {
            answer: clean_llm_response(&reply),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every user prompt
    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            let mut replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLlm {
        async fn generate(&self, _config: &LLMConfig, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| AppError::LLMError("script exhausted".to_string()))
        }
    }

    /// Fails queries mentioning `missing_table`, answers everything else with one row
    struct FakeDatabase {
        executed: Mutex<Vec<String>>,
    }

    impl FakeDatabase {
        fn new() -> Self {
            Self {
                executed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SqlDatabase for FakeDatabase {
        async fn table_info(&self, _sample_rows: usize) -> Result<String> {
            Ok("CREATE TABLE sales (city VARCHAR, units INT);".to_string())
        }

        async fn run_query(&self, sql: &str, _max_rows: usize) -> Result<QueryResult> {
            self.executed.lock().unwrap().push(sql.to_string());
            if sql.contains("missing_table") {
                return Err(AppError::DatabaseError(
                    "relation \"missing_table\" does not exist".to_string(),
                ));
            }
            Ok(QueryResult {
                columns: vec!["total".to_string()],
                rows: vec![vec![json!(42)]],
                row_count: 1,
                truncated: false,
            })
        }
    }

    fn agent(llm: Arc<ScriptedLlm>, db: Arc<FakeDatabase>) -> GeminiSqlAgent {
        GeminiSqlAgent::new(llm, LLMConfig::default(), db, AgentToolConfig::default())
    }

    fn question() -> AgentQuery {
        AgentQuery {
            query: "How many units were sold?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_answers_from_query_result() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "```sql\nSELECT SUM(units) AS total FROM sales;\n```",
            "42 units were sold in total.",
        ]));
        let db = Arc::new(FakeDatabase::new());

        let answer = agent(llm.clone(), db.clone()).ask(&question()).await.unwrap();

        assert_eq!(answer.answer, "42 units were sold in total.");
        assert_eq!(
            db.executed.lock().unwrap().as_slice(),
            ["SELECT SUM(units) AS total FROM sales"]
        );
        let prompts = llm.prompts();
        assert!(prompts[1].contains("total\n42"));
    }

    #[tokio::test]
    async fn test_retries_after_rejected_write() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "```sql\nDELETE FROM sales\n```",
            "```sql\nSELECT COUNT(*) AS total FROM sales\n```",
            "There are 42 rows.",
        ]));
        let db = Arc::new(FakeDatabase::new());

        let answer = agent(llm.clone(), db.clone()).ask(&question()).await.unwrap();

        assert_eq!(answer.answer, "There are 42 rows.");
        assert_eq!(db.executed.lock().unwrap().len(), 1);
        assert!(llm.prompts()[1].contains("was rejected"));
    }

    #[tokio::test]
    async fn test_retries_after_database_error() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "```sql\nSELECT * FROM missing_table\n```",
            "```sql\nSELECT SUM(units) AS total FROM sales\n```",
            "42.",
        ]));
        let db = Arc::new(FakeDatabase::new());

        agent(llm.clone(), db.clone()).ask(&question()).await.unwrap();

        assert_eq!(db.executed.lock().unwrap().len(), 2);
        assert!(llm.prompts()[1].contains("does not exist"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_iterations() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "I cannot tell.",
            "Still unsure.",
            "```sql\nDROP TABLE sales\n```",
        ]));
        let db = Arc::new(FakeDatabase::new());

        let err = agent(llm.clone(), db.clone())
            .ask(&question())
            .await
            .unwrap_err();

        match err {
            AppError::LLMError(msg) => {
                assert!(msg.contains("after 3 attempts"));
                assert!(msg.contains("DROP"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(llm.prompts().len(), 3);
        assert!(db.executed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_feedback_is_numbered() {
        let prompt = build_sql_user_prompt(" q ", &["first".to_string(), "second".to_string()]);
        assert!(prompt.starts_with("Question: q"));
        assert!(prompt.contains("\n1. first\n2. second"));
    }
}
