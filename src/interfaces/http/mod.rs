mod page;

use crate::application::use_cases::chat_session::{ChatSession, EMPTY_QUERY_MESSAGE};
use crate::application::use_cases::sql_agent::SqlAgent;
use crate::domain::chat::{AgentAnswer, HistoryEntry};
use crate::domain::error::AppError;
use crate::infrastructure::db::SqlDatabase;
use actix_cors::Cors;
use actix_web::cookie::Cookie;
use actix_web::{
    dev::Server, get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info};

pub use page::PAGE_TITLE;

pub const SESSION_COOKIE: &str = "sql_assistant_session";
const MAX_LOG_ENTRIES: usize = 100;
const MAX_SESSIONS: usize = 1000;
const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub message: String,
}

/// The agent and its database, or why they could not be built
pub enum AgentStatus {
    Ready {
        agent: Arc<dyn SqlAgent + Send + Sync>,
        database: Arc<dyn SqlDatabase + Send + Sync>,
        sample_rows: usize,
    },
    Failed(String),
}

struct SessionEntry {
    session: Arc<tokio::sync::Mutex<ChatSession>>,
    last_seen: Instant,
}

pub struct HttpState {
    pub status: AgentStatus,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    session_ttl: Duration,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

impl HttpState {
    pub fn new(status: AgentStatus) -> Self {
        Self {
            status,
            sessions: Mutex::new(HashMap::new()),
            max_sessions: MAX_SESSIONS,
            session_ttl: SESSION_IDLE_TTL,
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_session_limits(mut self, max_sessions: usize, session_ttl: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.session_ttl = session_ttl;
        self
    }

    /// Session named by the request cookie, if the server still knows it
    fn existing_session(&self, req: &HttpRequest) -> Option<Arc<tokio::sync::Mutex<ChatSession>>> {
        let id = req.cookie(SESSION_COOKIE)?.value().to_string();
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(entry.session.clone())
    }

    /// Known session for the cookie, or a new one; returns `true` when minted
    fn session_for_query(&self, req: &HttpRequest) -> (String, Arc<tokio::sync::Mutex<ChatSession>>, bool) {
        if let Some(id) = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string()) {
            if let Some(session) = self.existing_session(req) {
                return (id, session, false);
            }
        }

        let now = Instant::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(|p| p.into_inner());
        evict_sessions(&mut sessions, now, self.session_ttl, self.max_sessions - 1);

        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(tokio::sync::Mutex::new(ChatSession::new()));
        sessions.insert(
            id.clone(),
            SessionEntry {
                session: session.clone(),
                last_seen: now,
            },
        );
        (id, session, true)
    }

    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }
}

/// Drop sessions idle longer than `ttl`, then the least recently seen until at most `keep` remain
fn evict_sessions(
    sessions: &mut HashMap<String, SessionEntry>,
    now: Instant,
    ttl: Duration,
    keep: usize,
) {
    sessions.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= ttl);

    while sessions.len() > keep {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, entry)| entry.last_seen)
            .map(|(id, _)| id.clone());
        match oldest {
            Some(id) => {
                sessions.remove(&id);
            }
            None => break,
        }
    }
}

#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn session_cookie(id: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .finish()
}

fn with_session(mut response: HttpResponse, id: &str, is_new: bool) -> HttpResponse {
    if is_new {
        if let Err(e) = response.add_cookie(&session_cookie(id)) {
            error!("Failed to set session cookie: {}", e);
        }
    }
    response
}

#[get("/")]
async fn get_index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(page::index_html())
}

#[get("/status")]
async fn get_status(data: web::Data<HttpState>) -> impl Responder {
    let body = match &data.status {
        AgentStatus::Ready { .. } => StatusResponse {
            ready: true,
            error: None,
        },
        AgentStatus::Failed(reason) => StatusResponse {
            ready: false,
            error: Some(reason.clone()),
        },
    };
    HttpResponse::Ok().json(body)
}

#[get("/schema")]
async fn get_schema(data: web::Data<HttpState>) -> impl Responder {
    match &data.status {
        AgentStatus::Ready {
            database,
            sample_rows,
            ..
        } => match database.table_info(*sample_rows).await {
            Ok(info) => HttpResponse::Ok().content_type("text/plain").body(info),
            Err(e) => {
                add_log(&data.logs, "ERROR", &format!("Schema lookup failed: {}", e));
                HttpResponse::InternalServerError().body(format!("Error loading schema: {}", e))
            }
        },
        AgentStatus::Failed(reason) => HttpResponse::ServiceUnavailable().body(reason.clone()),
    }
}

#[post("/query")]
async fn post_query(
    req: HttpRequest,
    data: web::Data<HttpState>,
    body: web::Json<QueryRequest>,
) -> impl Responder {
    if body.query.trim().is_empty() {
        return HttpResponse::BadRequest().body(EMPTY_QUERY_MESSAGE);
    }

    let agent = match &data.status {
        AgentStatus::Ready { agent, .. } => agent.clone(),
        AgentStatus::Failed(reason) => {
            return HttpResponse::ServiceUnavailable()
                .body(format!("Error initializing SQL agent: {}", reason))
        }
    };

    let (id, session, is_new) = data.session_for_query(&req);
    add_log(&data.logs, "INFO", &format!("Query received: {}", body.query));

    // One question at a time per browser session.
    let mut session = session.lock().await;
    let response = match session.submit(agent.as_ref(), &body.query).await {
        Ok(answer) => HttpResponse::Ok().json(AgentAnswer { answer }),
        Err(AppError::ValidationError(msg)) => HttpResponse::BadRequest().body(msg),
        Err(e) => {
            error!("Error processing query: {}", e);
            add_log(&data.logs, "ERROR", &format!("Query failed: {}", e));
            HttpResponse::InternalServerError().body(format!("Error processing query: {}", e))
        }
    };

    with_session(response, &id, is_new)
}

#[get("/history")]
async fn get_history(req: HttpRequest, data: web::Data<HttpState>) -> impl Responder {
    let entries: Vec<HistoryEntry> = match data.existing_session(&req) {
        Some(session) => session.lock().await.history_newest_first(),
        None => Vec::new(),
    };
    HttpResponse::Ok().json(entries)
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data
        .logs
        .lock()
        .map(|logs| logs.clone())
        .unwrap_or_default();
    HttpResponse::Ok().json(logs)
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, message: &str) {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(|p| p.into_inner());
    logs.push(entry);
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_index).service(
        web::scope("/api")
            .service(get_status)
            .service(get_schema)
            .service(post_query)
            .service(get_history)
            .service(get_logs),
    );
}

pub fn start_server(state: HttpState, bind: SocketAddr) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(bind)?
    .run();

    info!("Serving {} on http://{}", PAGE_TITLE, bind);
    Ok(server)
}
