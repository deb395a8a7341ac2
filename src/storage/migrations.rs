//! Database migrations for Engram
//!
//! The schema is declarative and idempotent: tables and indices use
//! IF NOT EXISTS, triggers are guarded by a sqlite_master probe. A
//! previously-initialized database is left untouched on re-run.

use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id         TEXT PRIMARY KEY,
            project    TEXT NOT NULL,
            directory  TEXT NOT NULL,
            started_at TEXT NOT NULL DEFAULT (datetime('now')),
            ended_at   TEXT,
            summary    TEXT
        );

        CREATE TABLE IF NOT EXISTS observations (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT    NOT NULL,
            type       TEXT    NOT NULL,
            title      TEXT    NOT NULL,
            content    TEXT    NOT NULL,
            tool_name  TEXT,
            project    TEXT,
            created_at TEXT    NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_obs_session ON observations(session_id);
        CREATE INDEX IF NOT EXISTS idx_obs_type    ON observations(type);
        CREATE INDEX IF NOT EXISTS idx_obs_project ON observations(project);
        CREATE INDEX IF NOT EXISTS idx_obs_created ON observations(created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
            title,
            content,
            tool_name,
            type,
            project,
            content='observations',
            content_rowid='id'
        );

        CREATE TABLE IF NOT EXISTS user_prompts (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT    NOT NULL,
            content    TEXT    NOT NULL,
            project    TEXT,
            created_at TEXT    NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_prompts_session ON user_prompts(session_id);
        CREATE INDEX IF NOT EXISTS idx_prompts_project ON user_prompts(project);
        CREATE INDEX IF NOT EXISTS idx_prompts_created ON user_prompts(created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS prompts_fts USING fts5(
            content,
            project,
            content='user_prompts',
            content_rowid='id'
        );

        CREATE TABLE IF NOT EXISTS sync_chunks (
            chunk_id    TEXT PRIMARY KEY,
            imported_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )?;

    // External-content FTS tables require the explicit 'delete' payload
    // form in the delete/update triggers.
    if !trigger_exists(conn, "obs_fts_insert")? {
        conn.execute_batch(
            r#"
            CREATE TRIGGER obs_fts_insert AFTER INSERT ON observations BEGIN
                INSERT INTO observations_fts(rowid, title, content, tool_name, type, project)
                VALUES (new.id, new.title, new.content, new.tool_name, new.type, new.project);
            END;

            CREATE TRIGGER obs_fts_delete AFTER DELETE ON observations BEGIN
                INSERT INTO observations_fts(observations_fts, rowid, title, content, tool_name, type, project)
                VALUES ('delete', old.id, old.title, old.content, old.tool_name, old.type, old.project);
            END;

            CREATE TRIGGER obs_fts_update AFTER UPDATE ON observations BEGIN
                INSERT INTO observations_fts(observations_fts, rowid, title, content, tool_name, type, project)
                VALUES ('delete', old.id, old.title, old.content, old.tool_name, old.type, old.project);
                INSERT INTO observations_fts(rowid, title, content, tool_name, type, project)
                VALUES (new.id, new.title, new.content, new.tool_name, new.type, new.project);
            END;
            "#,
        )?;
    }

    if !trigger_exists(conn, "prompt_fts_insert")? {
        conn.execute_batch(
            r#"
            CREATE TRIGGER prompt_fts_insert AFTER INSERT ON user_prompts BEGIN
                INSERT INTO prompts_fts(rowid, content, project)
                VALUES (new.id, new.content, new.project);
            END;

            CREATE TRIGGER prompt_fts_delete AFTER DELETE ON user_prompts BEGIN
                INSERT INTO prompts_fts(prompts_fts, rowid, content, project)
                VALUES ('delete', old.id, old.content, old.project);
            END;

            CREATE TRIGGER prompt_fts_update AFTER UPDATE ON user_prompts BEGIN
                INSERT INTO prompts_fts(prompts_fts, rowid, content, project)
                VALUES ('delete', old.id, old.content, old.project);
                INSERT INTO prompts_fts(rowid, content, project)
                VALUES (new.id, new.content, new.project);
            END;
            "#,
        )?;
    }

    Ok(())
}

fn trigger_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type='trigger' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
