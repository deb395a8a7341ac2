//! Engram - Persistent memory for AI coding agents
//!
//! A local, embeddable store of sessions, observations, and user prompts
//! with full-text search, timeline queries, and git-friendly sync.

pub mod error;
pub mod http;
pub mod mcp;
pub mod redact;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{EngramError, Result};
pub use storage::Storage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
