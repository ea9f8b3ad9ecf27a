use crate::application::use_cases::sql_agent::SqlAgent;
use crate::domain::chat::{AgentQuery, ChatTurn, HistoryEntry};
use crate::domain::error::{AppError, Result};

pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a query first.";

const TITLE_PREVIEW_CHARS: usize = 50;

/// Question/answer history of one browser session
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the agent and record the turn. Failed turns are not recorded.
    pub async fn submit(
        &mut self,
        agent: &(dyn SqlAgent + Send + Sync),
        query: &str,
    ) -> Result<String> {
        if query.trim().is_empty() {
            return Err(AppError::ValidationError(EMPTY_QUERY_MESSAGE.to_string()));
        }

        let answer = agent
            .ask(&AgentQuery {
                query: query.to_string(),
            })
            .await?;

        self.turns.push(ChatTurn {
            query: query.to_string(),
            response: answer.answer.clone(),
        });
        Ok(answer.answer)
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Most recent turn first, numbered from 1
    pub fn history_newest_first(&self) -> Vec<HistoryEntry> {
        self.turns
            .iter()
            .rev()
            .enumerate()
            .map(|(i, turn)| HistoryEntry {
                number: i + 1,
                title: preview(&turn.query),
                query: turn.query.clone(),
                response: turn.response.clone(),
            })
            .collect()
    }
}

fn preview(query: &str) -> String {
    if query.chars().count() > TITLE_PREVIEW_CHARS {
        let head: String = query.chars().take(TITLE_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        query.to_string()
    }
}
