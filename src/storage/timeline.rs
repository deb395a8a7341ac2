//! Timeline: the chronological neighborhood around an observation
//!
//! Given a pivot observation, returns up to N observations before and M
//! after within the same session. Ordering is by id, not timestamp:
//! consecutive writes can collide on the second, and insertion order is
//! the authoritative chronology.

use rusqlite::{params, Connection};

use crate::error::{EngramError, Result};
use crate::types::{ObservationId, TimelineEntry, TimelineResult};

use super::queries::{get_observation, get_session};

fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<TimelineEntry> {
    Ok(TimelineEntry {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        observation_type: row.get("type")?,
        title: row.get("title")?,
        content: row.get("content")?,
        tool_name: row.get("tool_name")?,
        project: row.get("project")?,
        created_at: row.get("created_at")?,
        is_focus: false,
    })
}

/// Fetch the neighborhood around `observation_id`. Window sizes of zero
/// or less default to 5. A missing pivot is NotFound; a missing session
/// row is benign (manual saves reference a synthetic session id).
pub fn timeline(
    conn: &Connection,
    observation_id: ObservationId,
    before: i64,
    after: i64,
) -> Result<TimelineResult> {
    let before = if before <= 0 { 5 } else { before };
    let after = if after <= 0 { 5 } else { after };

    let focus = get_observation(conn, observation_id)
        .map_err(|_| EngramError::NotFound(format!("observation #{observation_id}")))?;

    let session_info = get_session(conn, &focus.session_id).ok();

    let mut stmt = conn.prepare(
        "SELECT id, session_id, type, title, content, tool_name, project, created_at
         FROM observations
         WHERE session_id = ?1 AND id < ?2
         ORDER BY id DESC
         LIMIT ?3",
    )?;
    let mut before_entries = stmt
        .query_map(
            params![focus.session_id, observation_id, before],
            entry_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    // Newest-first from the query; callers receive oldest-first.
    before_entries.reverse();

    let mut stmt = conn.prepare(
        "SELECT id, session_id, type, title, content, tool_name, project, created_at
         FROM observations
         WHERE session_id = ?1 AND id > ?2
         ORDER BY id ASC
         LIMIT ?3",
    )?;
    let after_entries = stmt
        .query_map(
            params![focus.session_id, observation_id, after],
            entry_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let total_in_range: i64 = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE session_id = ?1",
        [&focus.session_id],
        |row| row.get(0),
    )?;

    Ok(TimelineResult {
        focus,
        before: before_entries,
        after: after_entries,
        session_info,
        total_in_range,
    })
}
