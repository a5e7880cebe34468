//! aula-cli — terminal frontend for the Aula HTTP API
//!
//! Talks to a running aula-server over HTTP. The chat subcommand keeps a
//! conversation going across invocations via an explicit session id; when
//! none is given a fresh one is generated and printed so the next call can
//! continue the same conversation.
//!
//! # Subcommands
//! - `chat <message> [--session <id>]`    — one assistant turn
//! - `search <query> [-n <limit>] [--json]` — semantic catalog search
//! - `courses [--json]`                   — list the course catalog
//! - `history <session_id>`               — show a stored conversation
//! - `status`                             — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8780";
const DEFAULT_LIMIT: usize = 5;
const PREVIEW_CHARS: usize = 160;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "aula-cli",
    version,
    about = "Aula course assistant — terminal frontend"
)]
struct Cli {
    /// Aula HTTP server URL (overrides AULA_HTTP_URL env var)
    #[arg(long, env = "AULA_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send one message to the course assistant
    Chat {
        /// Message text for the assistant
        message: String,

        /// Session id to continue; omit to start a new conversation
        #[arg(short, long)]
        session: Option<String>,

        /// Output the raw response JSON (includes the session id)
        #[arg(long)]
        json: bool,
    },

    /// Search the course catalog semantically
    Search {
        /// Query text to search for
        query: String,

        /// Maximum number of results to return
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Output raw JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// List the course catalog
    Courses {
        /// Output raw JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show the stored conversation for a session
    History {
        /// Session id to inspect
        session_id: String,
    },

    /// Show Aula server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// One similarity match from POST /courses/search
#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub similarity: f64,
}

/// The full search response from POST /courses/search
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub count: usize,
    pub took_ms: Option<u64>,
}

/// A catalog entry from GET /courses
#[derive(Debug, Deserialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub location: Option<String>,
    pub starts_on: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CoursesResponse {
    pub courses: Vec<CourseSummary>,
    pub count: usize,
}

/// One assistant turn from POST /chat
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub took_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<HistoryMessage>,
    pub count: usize,
}

// ============================================================================
// Output Formatting
// ============================================================================

/// Single-line content preview: newlines collapsed, capped at `max` chars.
pub fn preview(content: &str, max: usize) -> String {
    let flat: String = content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    flat.chars().take(max).collect()
}

/// Similarity rendered as a whole percentage, e.g. "87%".
pub fn format_score(similarity: f64) -> String {
    format!("{:.0}%", similarity * 100.0)
}

/// One search result as a two-line block.
pub fn format_search_result(r: &SearchResult) -> String {
    format!(
        "{}  {}\n      {}",
        format_score(r.similarity),
        r.title,
        preview(&r.content, PREVIEW_CHARS)
    )
}

/// One catalog row: active marker, title, then location and start date.
pub fn format_course_line(c: &CourseSummary) -> String {
    let marker = if c.is_active { "●" } else { "○" };
    let mut line = format!("{} {}", marker, c.title);
    if let Some(loc) = &c.location {
        line.push_str(&format!("  [{}]", loc));
    }
    if let Some(date) = &c.starts_on {
        line.push_str(&format!("  (inicia {})", date));
    }
    line
}

/// One conversation entry with its speaker label.
pub fn format_history_line(m: &HistoryMessage) -> String {
    let label = match m.role.as_str() {
        "user" => "Usuario",
        "assistant" => "Asistente",
        other => other,
    };
    format!("{}: {}", label, m.content)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn post_json(
    client: &reqwest::blocking::Client,
    url: &str,
    body: &serde_json::Value,
) -> reqwest::blocking::Response {
    let resp = match client.post(url).json(body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("aula-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    resp
}

/// Send one chat message; prints the session id on new conversations.
fn do_chat(
    server: &str,
    message: &str,
    session: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let client = http_client(120)?;

    let new_conversation = session.is_none();
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let url = format!("{}/chat", server);
    let body = serde_json::json!({
        "session_id": session_id,
        "message": message,
    });

    let resp = post_json(&client, &url, &body);

    if json_output {
        let raw: serde_json::Value = match resp.json() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("aula-cli: failed to parse chat response: {}", e);
                std::process::exit(1);
            }
        };
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }

    let chat_resp: ChatResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: failed to parse chat response: {}", e);
            std::process::exit(1);
        }
    };

    if new_conversation {
        eprintln!("Sesión: {}", chat_resp.session_id);
        eprintln!("(continuá con: aula-cli chat \"...\" --session {})\n", chat_resp.session_id);
    }

    println!("{}", chat_resp.reply);

    Ok(())
}

/// Semantic catalog search against POST /courses/search.
fn do_search(server: &str, query: &str, limit: usize, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(30)?;

    let url = format!("{}/courses/search", server);
    let body = serde_json::json!({
        "query": query,
        "limit": limit,
    });

    let resp = post_json(&client, &url, &body);

    if json_output {
        let raw: serde_json::Value = match resp.json() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("aula-cli: failed to parse search response: {}", e);
                std::process::exit(1);
            }
        };
        match serde_json::to_string_pretty(&raw) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("aula-cli: failed to serialize results: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let search_resp: SearchResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: failed to parse search response: {}", e);
            std::process::exit(1);
        }
    };

    if search_resp.results.is_empty() {
        eprintln!("Sin resultados para: {}", query);
        return Ok(());
    }

    for r in &search_resp.results {
        println!("{}\n", format_search_result(r));
    }

    Ok(())
}

/// List the catalog via GET /courses.
fn do_courses(server: &str, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(30)?;

    let url = format!("{}/courses", server);
    let resp = match client.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        eprintln!("aula-cli: server returned {}", status);
        std::process::exit(1);
    }

    if json_output {
        let raw: serde_json::Value = resp.json().unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&raw)?);
        return Ok(());
    }

    let courses_resp: CoursesResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: failed to parse courses response: {}", e);
            std::process::exit(1);
        }
    };

    if courses_resp.courses.is_empty() {
        println!("El catálogo está vacío.");
        return Ok(());
    }

    for c in &courses_resp.courses {
        println!("{}", format_course_line(c));
    }
    println!("\n{} curso(s)", courses_resp.count);

    Ok(())
}

/// Dump the stored conversation for a session via GET /history/:id.
fn do_history(server: &str, session_id: &str) -> anyhow::Result<()> {
    let client = http_client(30)?;

    let url = format!("{}/history/{}", server, session_id);
    let resp = match client.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        eprintln!("aula-cli: server returned {}", status);
        std::process::exit(1);
    }

    let history_resp: HistoryResponse = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("aula-cli: failed to parse history response: {}", e);
            std::process::exit(1);
        }
    };

    if history_resp.messages.is_empty() {
        println!("Sin mensajes para la sesión {}", history_resp.session_id);
        return Ok(());
    }

    for m in &history_resp.messages {
        println!("{}", format_history_line(m));
    }

    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client(10)?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Aula server:    {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:        {}", body["version"].as_str().unwrap_or("?"));
            println!("PostgreSQL:     {}", body["postgresql"].as_str().unwrap_or("?"));
            println!("pgvector:       {}", body["pgvector"].as_str().unwrap_or("?"));
            println!("Active courses: {}", body["active_courses"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("aula-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("aula-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Chat { message, session, json } => do_chat(&server, &message, session, json),
        Commands::Search { query, limit, json } => do_search(&server, &query, limit, json),
        Commands::Courses { json } => do_courses(&server, json),
        Commands::History { session_id } => do_history(&server, &session_id),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("aula-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
