//! Database connection management
//!
//! A single shared connection in WAL mode with a 5 second busy timeout.
//! Writers are serialized by SQLite; readers do not block writers.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};

use super::migrations::run_migrations;
use crate::error::Result;
use crate::types::Config;

/// Storage engine wrapping SQLite
pub struct Storage {
    config: Config,
    conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open or create the database under `config.data_dir`, applying
    /// pragmas and migrations. Creates the data directory if missing.
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(config.db_path(), flags)?;

        Self::configure_pragmas(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            config,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for testing
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_pragmas(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            config: Config::default(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=5000;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            "#,
        )?;
        Ok(())
    }

    /// Execute a function with the connection
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a function inside a transaction; commits on Ok, rolls back
    /// when the closure fails.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            conn: self.conn.clone(),
        }
    }
}
