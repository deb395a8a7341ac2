//! Core types for Engram

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unique identifier for an observation or prompt
pub type ObservationId = i64;

/// A bounded unit of agent activity. The id is supplied by the caller
/// (agent hosts own the session lifecycle), never generated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project: String,
    pub directory: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One recorded fact produced inside a session. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub session_id: String,
    /// Type tag (e.g. "decision", "bugfix", "file_change", "tool_use")
    #[serde(rename = "type")]
    pub observation_type: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub created_at: String,
}

/// A user-authored message captured verbatim (after redaction)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: ObservationId,
    pub session_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub created_at: String,
}

/// A full-text search hit with its FTS5 relevance rank (lower = better)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub observation: Observation,
    pub rank: f64,
}

/// A session with its observation count, for listings and the digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub project: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub observation_count: i64,
}

/// Store-wide counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: i64,
    pub total_observations: i64,
    pub total_prompts: i64,
    pub projects: Vec<String>,
}

/// One row in a timeline window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: ObservationId,
    pub session_id: String,
    #[serde(rename = "type")]
    pub observation_type: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub created_at: String,
    /// True only for the pivot observation
    #[serde(default)]
    pub is_focus: bool,
}

/// The chronological neighborhood around a pivot observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResult {
    pub focus: Observation,
    /// Older observations from the same session, oldest first
    pub before: Vec<TimelineEntry>,
    /// Newer observations from the same session, oldest first
    pub after: Vec<TimelineEntry>,
    /// Null when the pivot references a synthetic session (manual saves)
    pub session_info: Option<Session>,
    pub total_in_range: i64,
}

/// Filters for full-text search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub observation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// Parameters for recording an observation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddObservationParams {
    pub session_id: String,
    #[serde(rename = "type")]
    pub observation_type: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Parameters for recording a user prompt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddPromptParams {
    pub session_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

/// Full serializable snapshot of the database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

/// Tallies from applying a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportResult {
    pub sessions_imported: i64,
    pub observations_imported: i64,
    pub prompts_imported: i64,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding engram.db
    pub data_dir: PathBuf,
    /// HTTP facade port
    pub http_port: u16,
    /// Content beyond this is truncated with a "... [truncated]" suffix
    pub max_observation_length: usize,
    /// Observations included in the context digest
    pub max_context_results: i64,
    /// Hard cap on search results, even when callers ask for more
    pub max_search_results: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(shellexpand::tilde("~/.engram").into_owned()),
            http_port: 7437,
            max_observation_length: 2000,
            max_context_results: 20,
            max_search_results: 20,
        }
    }
}

impl Config {
    /// Default configuration with ENGRAM_DATA_DIR / ENGRAM_PORT applied
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = std::env::var("ENGRAM_DATA_DIR") {
            if !dir.is_empty() {
                cfg.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(port) = std::env::var("ENGRAM_PORT") {
            if let Ok(n) = port.parse() {
                cfg.http_port = n;
            }
        }
        cfg
    }

    /// Path of the database file inside the data directory
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("engram.db")
    }
}

/// Observation type for a given tool name
pub fn classify_tool(tool_name: &str) -> &'static str {
    match tool_name {
        "write" | "edit" | "patch" => "file_change",
        "bash" => "command",
        "read" | "view" => "file_read",
        "grep" | "glob" | "ls" => "search",
        _ => "tool_use",
    }
}

/// Current UTC time formatted the way SQLite's datetime('now') emits it
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
