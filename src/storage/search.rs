//! Full-text search over the FTS5 indexes
//!
//! Raw user text cannot be passed to the MATCH grammar: punctuation is
//! syntactic there. Each whitespace-separated token is wrapped in double
//! quotes, yielding an AND of literal tokens.

use rusqlite::Connection;

use crate::error::{EngramError, Result};
use crate::types::{Config, Prompt, SearchOptions, SearchResult};

use super::queries::{observation_from_row, prompt_from_row};

/// Normalize a free-text query into a safe FTS5 match expression.
/// `fix: auth!` becomes `"fix:" "auth!"`.
pub fn sanitize_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.trim_matches('"')))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search observations, ranked by FTS5 relevance (lower rank = better).
/// The limit is capped at `max_search_results` regardless of the caller.
pub fn search(
    conn: &Connection,
    cfg: &Config,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>> {
    let fts_query = sanitize_match_query(query);
    if fts_query.is_empty() {
        return Err(EngramError::InvalidInput("search query is empty".into()));
    }

    let mut limit = opts.limit.unwrap_or(0);
    if limit <= 0 {
        limit = 10;
    }
    if limit > cfg.max_search_results {
        limit = cfg.max_search_results;
    }

    let mut sql = String::from(
        "SELECT o.id, o.session_id, o.type, o.title, o.content, o.tool_name, o.project,
                o.created_at, fts.rank
         FROM observations_fts fts
         JOIN observations o ON o.id = fts.rowid
         WHERE observations_fts MATCH ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts_query)];

    if let Some(t) = opts.observation_type.as_deref().filter(|t| !t.is_empty()) {
        sql.push_str(" AND o.type = ?");
        args.push(Box::new(t.to_string()));
    }
    if let Some(p) = opts.project.as_deref().filter(|p| !p.is_empty()) {
        sql.push_str(" AND o.project = ?");
        args.push(Box::new(p.to_string()));
    }

    sql.push_str(" ORDER BY fts.rank LIMIT ?");
    args.push(Box::new(limit));

    let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok(SearchResult {
            observation: observation_from_row(row)?,
            rank: row.get("rank")?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

/// Search user prompts, same sanitization and ranking
pub fn search_prompts(
    conn: &Connection,
    query: &str,
    project: Option<&str>,
    limit: i64,
) -> Result<Vec<Prompt>> {
    let fts_query = sanitize_match_query(query);
    if fts_query.is_empty() {
        return Err(EngramError::InvalidInput("search query is empty".into()));
    }

    let limit = if limit <= 0 { 10 } else { limit };

    let mut sql = String::from(
        "SELECT p.id, p.session_id, p.content, p.project, p.created_at
         FROM prompts_fts fts
         JOIN user_prompts p ON p.id = fts.rowid
         WHERE prompts_fts MATCH ?",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts_query)];

    if let Some(p) = project.filter(|p| !p.is_empty()) {
        sql.push_str(" AND p.project = ?");
        args.push(Box::new(p.to_string()));
    }

    sql.push_str(" ORDER BY fts.rank LIMIT ?");
    args.push(Box::new(limit));

    let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), prompt_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::queries::{add_observation, add_prompt, create_session};
    use crate::storage::Storage;
    use crate::types::{AddObservationParams, AddPromptParams};

    #[test]
    fn test_sanitize_quotes_each_token() {
        assert_eq!(sanitize_match_query("fix auth bug"), r#""fix" "auth" "bug""#);
        assert_eq!(sanitize_match_query("fix: auth!"), r#""fix:" "auth!""#);
        assert_eq!(sanitize_match_query(r#""quoted" term"#), r#""quoted" "term""#);
        assert_eq!(sanitize_match_query("   "), "");
    }

    fn seed(storage: &Storage) {
        storage
            .with_connection(|conn| {
                create_session(conn, "s1", "acme", "/tmp/acme")?;
                add_observation(
                    conn,
                    storage.config(),
                    &AddObservationParams {
                        session_id: "s1".into(),
                        observation_type: "bugfix".into(),
                        title: "Fix N+1".into(),
                        content: "Batch loaded users".into(),
                        tool_name: None,
                        project: Some("acme".into()),
                    },
                )?;
                add_observation(
                    conn,
                    storage.config(),
                    &AddObservationParams {
                        session_id: "s1".into(),
                        observation_type: "decision".into(),
                        title: "Schema layout".into(),
                        content: "Denormalized project column".into(),
                        tool_name: None,
                        project: Some("acme".into()),
                    },
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_search_matches_tokens() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);

        let results = storage
            .with_connection(|conn| {
                search(
                    conn,
                    storage.config(),
                    "users",
                    &SearchOptions {
                        project: Some("acme".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].observation.title, "Fix N+1");
    }

    #[test]
    fn test_search_type_filter() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);

        let results = storage
            .with_connection(|conn| {
                search(
                    conn,
                    storage.config(),
                    "acme",
                    &SearchOptions {
                        observation_type: Some("decision".into()),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].observation.observation_type, "decision");
    }

    #[test]
    fn test_search_empty_query_is_invalid_input() {
        let storage = Storage::open_in_memory().unwrap();
        let err = storage
            .with_connection(|conn| {
                search(conn, storage.config(), "  ", &SearchOptions::default())
            })
            .unwrap_err();
        assert!(matches!(err, crate::error::EngramError::InvalidInput(_)));
    }

    #[test]
    fn test_search_punctuation_does_not_error() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage);

        let results = storage
            .with_connection(|conn| {
                search(conn, storage.config(), "fix: auth!", &SearchOptions::default())
            })
            .unwrap();
        // Tokens "fix:" and "auth!" are literal; no FTS grammar error.
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_limit_capped() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                create_session(conn, "s1", "acme", "/tmp")?;
                for i in 0..30 {
                    add_observation(
                        conn,
                        storage.config(),
                        &AddObservationParams {
                            session_id: "s1".into(),
                            observation_type: "discovery".into(),
                            title: format!("finding {i}"),
                            content: "shared keyword".into(),
                            tool_name: None,
                            project: None,
                        },
                    )?;
                }
                Ok(())
            })
            .unwrap();

        let results = storage
            .with_connection(|conn| {
                search(
                    conn,
                    storage.config(),
                    "shared",
                    &SearchOptions {
                        limit: Some(100),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert_eq!(results.len() as i64, storage.config().max_search_results);
    }

    #[test]
    fn test_search_prompts() {
        let storage = Storage::open_in_memory().unwrap();
        storage
            .with_connection(|conn| {
                create_session(conn, "s1", "acme", "/tmp")?;
                add_prompt(
                    conn,
                    storage.config(),
                    &AddPromptParams {
                        session_id: "s1".into(),
                        content: "please refactor the auth flow".into(),
                        project: Some("acme".into()),
                    },
                )?;
                Ok(())
            })
            .unwrap();

        let hits = storage
            .with_connection(|conn| search_prompts(conn, "refactor", Some("acme"), 0))
            .unwrap();
        assert_eq!(hits.len(), 1);

        let miss = storage
            .with_connection(|conn| search_prompts(conn, "refactor", Some("other"), 0))
            .unwrap();
        assert!(miss.is_empty());
    }
}
