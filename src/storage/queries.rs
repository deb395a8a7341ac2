//! Database queries for sessions, observations, and user prompts

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{EngramError, Result};
use crate::redact::strip_private_tags;
use crate::types::{
    AddObservationParams, AddPromptParams, Config, Observation, ObservationId, Prompt, Session,
    SessionSummary, Stats,
};

/// Marker appended when content exceeds the configured maximum
pub const TRUNCATION_MARKER: &str = "... [truncated]";

pub(crate) fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        project: row.get("project")?,
        directory: row.get("directory")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        summary: row.get("summary")?,
    })
}

pub(crate) fn observation_from_row(row: &Row) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        observation_type: row.get("type")?,
        title: row.get("title")?,
        content: row.get("content")?,
        tool_name: row.get("tool_name")?,
        project: row.get("project")?,
        created_at: row.get("created_at")?,
    })
}

pub(crate) fn prompt_from_row(row: &Row) -> rusqlite::Result<Prompt> {
    Ok(Prompt {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        content: row.get("content")?,
        project: row.get("project")?,
        created_at: row.get("created_at")?,
    })
}

/// Create a session. Idempotent: re-creation of an existing id is a no-op.
pub fn create_session(conn: &Connection, id: &str, project: &str, directory: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EngramError::InvalidInput("session id is empty".into()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO sessions (id, project, directory) VALUES (?1, ?2, ?3)",
        params![id, project, directory],
    )?;
    Ok(())
}

/// Mark a session as ended and record its summary. A second call
/// overwrites the earlier end time and summary.
pub fn end_session(conn: &Connection, id: &str, summary: &str) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET ended_at = datetime('now'), summary = ?1 WHERE id = ?2",
        params![nullable(summary), id],
    )?;
    Ok(())
}

/// Fetch a session by id
pub fn get_session(conn: &Connection, id: &str) -> Result<Session> {
    conn.query_row(
        "SELECT id, project, directory, started_at, ended_at, summary FROM sessions WHERE id = ?1",
        [id],
        session_from_row,
    )
    .optional()?
    .ok_or_else(|| EngramError::NotFound(format!("session {id}")))
}

/// Recent sessions with observation counts, most recent first
pub fn recent_sessions(
    conn: &Connection,
    project: Option<&str>,
    limit: i64,
) -> Result<Vec<SessionSummary>> {
    let limit = if limit <= 0 { 5 } else { limit };

    let mut sql = String::from(
        "SELECT s.id, s.project, s.started_at, s.ended_at, s.summary,
                COUNT(o.id) AS observation_count
         FROM sessions s
         LEFT JOIN observations o ON o.session_id = s.id
         WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(p) = project {
        sql.push_str(" AND s.project = ?");
        args.push(Box::new(p.to_string()));
    }

    sql.push_str(" GROUP BY s.id ORDER BY s.started_at DESC LIMIT ?");
    args.push(Box::new(limit));

    let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(SessionSummary {
            id: row.get("id")?,
            project: row.get("project")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            summary: row.get("summary")?,
            observation_count: row.get("observation_count")?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Record an observation. Redacts, then truncates to the configured
/// maximum, then inserts. Returns the new row id.
pub fn add_observation(
    conn: &Connection,
    cfg: &Config,
    p: &AddObservationParams,
) -> Result<ObservationId> {
    let title = strip_private_tags(&p.title);
    let content = truncate_content(&strip_private_tags(&p.content), cfg.max_observation_length);

    conn.execute(
        "INSERT INTO observations (session_id, type, title, content, tool_name, project)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            p.session_id,
            p.observation_type,
            title,
            content,
            p.tool_name.as_deref().and_then(nullable),
            p.project.as_deref().and_then(nullable),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch a single observation by id
pub fn get_observation(conn: &Connection, id: ObservationId) -> Result<Observation> {
    conn.query_row(
        "SELECT id, session_id, type, title, content, tool_name, project, created_at
         FROM observations WHERE id = ?1",
        [id],
        observation_from_row,
    )
    .optional()?
    .ok_or_else(|| EngramError::NotFound(format!("observation #{id}")))
}

/// Latest observations, most recent first
pub fn recent_observations(
    conn: &Connection,
    cfg: &Config,
    project: Option<&str>,
    limit: i64,
) -> Result<Vec<Observation>> {
    let limit = if limit <= 0 {
        cfg.max_context_results
    } else {
        limit
    };

    let mut sql = String::from(
        "SELECT o.id, o.session_id, o.type, o.title, o.content, o.tool_name, o.project, o.created_at
         FROM observations o",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(p) = project {
        sql.push_str(" WHERE o.project = ?");
        args.push(Box::new(p.to_string()));
    }

    sql.push_str(" ORDER BY o.created_at DESC, o.id DESC LIMIT ?");
    args.push(Box::new(limit));

    query_observations(conn, &sql, &args)
}

/// All observations for one session, oldest first
pub fn session_observations(
    conn: &Connection,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Observation>> {
    let limit = if limit <= 0 { 200 } else { limit };
    let args: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(session_id.to_string()), Box::new(limit)];
    query_observations(
        conn,
        "SELECT id, session_id, type, title, content, tool_name, project, created_at
         FROM observations
         WHERE session_id = ?
         ORDER BY created_at ASC, id ASC
         LIMIT ?",
        &args,
    )
}

/// Record a user prompt. Same redaction and truncation rules as
/// observations.
pub fn add_prompt(conn: &Connection, cfg: &Config, p: &AddPromptParams) -> Result<ObservationId> {
    let content = truncate_content(&strip_private_tags(&p.content), cfg.max_observation_length);

    conn.execute(
        "INSERT INTO user_prompts (session_id, content, project) VALUES (?1, ?2, ?3)",
        params![
            p.session_id,
            content,
            p.project.as_deref().and_then(nullable),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Latest prompts, most recent first
pub fn recent_prompts(
    conn: &Connection,
    project: Option<&str>,
    limit: i64,
) -> Result<Vec<Prompt>> {
    let limit = if limit <= 0 { 20 } else { limit };

    let mut sql =
        String::from("SELECT id, session_id, content, project, created_at FROM user_prompts");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(p) = project {
        sql.push_str(" WHERE project = ?");
        args.push(Box::new(p.to_string()));
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
    args.push(Box::new(limit));

    let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), prompt_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Store-wide counts and the sorted distinct project set
pub fn stats(conn: &Connection) -> Result<Stats> {
    let total_sessions: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
    let total_observations: i64 =
        conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))?;
    let total_prompts: i64 =
        conn.query_row("SELECT COUNT(*) FROM user_prompts", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT DISTINCT project FROM observations WHERE project IS NOT NULL ORDER BY project",
    )?;
    let projects = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(Stats {
        total_sessions,
        total_observations,
        total_prompts,
        projects,
    })
}

pub(crate) fn query_observations(
    conn: &Connection,
    sql: &str,
    args: &[Box<dyn rusqlite::ToSql>],
) -> Result<Vec<Observation>> {
    let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), observation_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

fn nullable(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Truncate to at most `max` bytes (on a char boundary), appending the
/// truncation marker. Content of exactly `max` bytes is stored verbatim.
fn truncate_content(content: &str, max: usize) -> String {
    if content.len() <= max {
        return content.to_string();
    }
    let mut end = max;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &content[..end], TRUNCATION_MARKER)
}
