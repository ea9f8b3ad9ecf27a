use serde::{Deserialize, Serialize};

/// Free-text question put to the SQL agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentQuery {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,
}

/// One answered question within a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
}

/// History entry as shown in the UI, newest first
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub number: usize,
    pub title: String,
    pub query: String,
    pub response: String,
}
