//! Storage engine for Engram
//!
//! SQLite with WAL mode and FTS5 full-text search. This is the core of
//! Engram - everything else (HTTP server, MCP server, CLI) talks to this.

mod connection;
pub mod context;
pub mod export;
mod migrations;
pub mod queries;
pub mod search;
pub mod timeline;

pub use connection::Storage;
pub use context::format_context;
pub use export::{export, import, record_synced_chunk, synced_chunks};
pub use queries::{
    add_observation, add_prompt, create_session, end_session, get_observation, get_session,
    recent_observations, recent_prompts, recent_sessions, session_observations, stats,
};
pub use search::{sanitize_match_query, search, search_prompts};
pub use timeline::timeline;
