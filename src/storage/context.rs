//! Context digest for new agent sessions
//!
//! Produces a Markdown summary of recent sessions, prompts, and
//! observations for injection into a fresh agent context. Callers rely
//! on the empty string to mean "nothing to inject".

use std::fmt::Write;

use rusqlite::Connection;

use crate::error::Result;
use crate::types::Config;

use super::queries::{recent_observations, recent_prompts, recent_sessions};

/// Format the digest for a project (or all projects when None)
pub fn format_context(conn: &Connection, cfg: &Config, project: Option<&str>) -> Result<String> {
    let sessions = recent_sessions(conn, project, 5)?;
    let observations = recent_observations(conn, cfg, project, cfg.max_context_results)?;
    let prompts = recent_prompts(conn, project, 10)?;

    if sessions.is_empty() && observations.is_empty() && prompts.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::from("## Memory from Previous Sessions\n\n");

    if !sessions.is_empty() {
        out.push_str("### Recent Sessions\n");
        for sess in &sessions {
            let summary = sess
                .summary
                .as_deref()
                .map(|s| format!(": {}", truncate(s, 200)))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "- **{}** ({}){} [{} observations]",
                sess.project, sess.started_at, summary, sess.observation_count
            );
        }
        out.push('\n');
    }

    if !prompts.is_empty() {
        out.push_str("### Recent User Prompts\n");
        for p in &prompts {
            let _ = writeln!(out, "- {}: {}", p.created_at, truncate(&p.content, 200));
        }
        out.push('\n');
    }

    if !observations.is_empty() {
        out.push_str("### Recent Observations\n");
        for obs in &observations {
            let _ = writeln!(
                out,
                "- [{}] **{}**: {}",
                obs.observation_type,
                obs.title,
                truncate(&obs.content, 300)
            );
        }
        out.push('\n');
    }

    Ok(out)
}

/// Display truncation with a bare ellipsis, on a char boundary
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
