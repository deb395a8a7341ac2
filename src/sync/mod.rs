//! Git-friendly memory sync
//!
//! Memories travel through a source-control repository as compressed,
//! content-addressed chunks under `.engram/`:
//!
//! ```text
//! .engram/manifest.json          list of known chunk ids
//! .engram/chunks/<id>.json.gz    gzipped ExportData delta
//! ```
//!
//! A chunk id, once recorded in the sync_chunks table, is never
//! re-imported. All writes go through the store's insert path so the
//! FTS triggers keep the index coherent.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EngramError, Result};
use crate::storage::{export, import, record_synced_chunk, synced_chunks, Storage};
use crate::types::{now_timestamp, ExportData, Observation, Prompt};
use crate::VERSION;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    chunks: Vec<String>,
}

/// Counts reported by `SyncEngine::status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Chunks recorded in the sync_chunks table
    pub local_chunks: usize,
    /// Chunk files present on disk
    pub remote_chunks: usize,
    /// On-disk chunks not yet imported
    pub pending_import: usize,
}

/// Outcome of a chunk export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub chunk_id: String,
    pub sessions_exported: usize,
    pub observations_exported: usize,
    pub prompts_exported: usize,
    /// True when nothing new needed exporting; no file was written
    pub is_empty: bool,
}

/// Outcome of importing on-disk chunks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub chunks_imported: usize,
    pub chunks_skipped: usize,
    pub sessions_imported: i64,
    pub observations_imported: i64,
    pub prompts_imported: i64,
}

/// Drives chunk export/import between the store and a sync directory
pub struct SyncEngine {
    storage: Storage,
    dir: PathBuf,
}

impl SyncEngine {
    pub fn new(storage: Storage, dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            dir: dir.into(),
        }
    }

    fn chunks_dir(&self) -> PathBuf {
        self.dir.join("chunks")
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Local vs. on-disk chunk counts
    pub fn status(&self) -> Result<SyncStatus> {
        let local = self.storage.with_connection(synced_chunks)?;
        let remote = self.disk_chunk_ids()?;
        let pending = remote.iter().filter(|id| !local.contains(*id)).count();

        Ok(SyncStatus {
            local_chunks: local.len(),
            remote_chunks: remote.len(),
            pending_import: pending,
        })
    }

    /// Export memories not yet covered by any on-disk chunk. With a
    /// project, only that project's rows are considered. Writes nothing
    /// when the delta is empty.
    pub fn export(&self, username: &str, project: Option<&str>) -> Result<ExportOutcome> {
        let full = self.storage.with_connection(export)?;
        let mut delta = filter_by_project(full, project);

        // Rows already present in a chunk on disk have been exported
        // before (possibly by another machine); skip them.
        let seen = self.seen_keys()?;
        delta.sessions.retain(|s| !seen.sessions.contains(&s.id));
        delta
            .observations
            .retain(|o| !seen.observations.contains(&observation_key(o)));
        delta.prompts.retain(|p| !seen.prompts.contains(&prompt_key(p)));

        if delta.sessions.is_empty() && delta.observations.is_empty() && delta.prompts.is_empty() {
            return Ok(ExportOutcome {
                is_empty: true,
                ..Default::default()
            });
        }

        let chunk_id = chunk_id(username, &delta)?;
        let payload = ExportData {
            version: VERSION.to_string(),
            exported_at: now_timestamp(),
            sessions: delta.sessions,
            observations: delta.observations,
            prompts: delta.prompts,
        };

        std::fs::create_dir_all(self.chunks_dir())?;
        let path = self.chunks_dir().join(format!("{chunk_id}.json.gz"));
        let file = File::create(&path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer(&mut encoder, &payload)?;
        encoder.finish()?;

        self.add_to_manifest(&chunk_id)?;
        self.storage
            .with_connection(|conn| record_synced_chunk(conn, &chunk_id))?;

        Ok(ExportOutcome {
            chunk_id,
            sessions_exported: payload.sessions.len(),
            observations_exported: payload.observations.len(),
            prompts_exported: payload.prompts.len(),
            is_empty: false,
        })
    }

    /// Import every on-disk chunk this database has not seen. Each chunk
    /// applies in its own transaction; already-recorded ids are skipped.
    pub fn import(&self) -> Result<ImportOutcome> {
        let mut outcome = ImportOutcome::default();
        let seen = self.storage.with_connection(synced_chunks)?;

        for chunk_id in self.disk_chunk_ids()? {
            if seen.contains(&chunk_id) {
                outcome.chunks_skipped += 1;
                continue;
            }

            let data = self.read_chunk(&chunk_id)?;
            let result = self.storage.with_transaction(|conn| import(conn, &data))?;
            self.storage
                .with_connection(|conn| record_synced_chunk(conn, &chunk_id))?;

            outcome.chunks_imported += 1;
            outcome.sessions_imported += result.sessions_imported;
            outcome.observations_imported += result.observations_imported;
            outcome.prompts_imported += result.prompts_imported;
        }

        Ok(outcome)
    }

    fn read_chunk(&self, chunk_id: &str) -> Result<ExportData> {
        let path = self.chunks_dir().join(format!("{chunk_id}.json.gz"));
        let file = File::open(&path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        serde_json::from_reader(decoder).map_err(|e| {
            EngramError::Sync(format!("malformed chunk {}: {e}", path.display()))
        })
    }

    fn disk_chunk_ids(&self) -> Result<Vec<String>> {
        let dir = self.chunks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(id) = chunk_id_from_path(&entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn add_to_manifest(&self, chunk_id: &str) -> Result<()> {
        let mut manifest = match std::fs::read(self.manifest_path()) {
            Ok(raw) => serde_json::from_slice::<Manifest>(&raw)
                .map_err(|e| EngramError::Sync(format!("malformed manifest.json: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(e) => return Err(e.into()),
        };

        if !manifest.chunks.iter().any(|c| c == chunk_id) {
            manifest.chunks.push(chunk_id.to_string());
            manifest.chunks.sort();
        }

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(
            self.manifest_path(),
            serde_json::to_vec_pretty(&manifest)?,
        )?;
        Ok(())
    }

    /// Identity keys of every row already present in an on-disk chunk
    fn seen_keys(&self) -> Result<SeenKeys> {
        let mut seen = SeenKeys::default();
        for chunk_id in self.disk_chunk_ids()? {
            let data = self.read_chunk(&chunk_id)?;
            for s in &data.sessions {
                seen.sessions.insert(s.id.clone());
            }
            for o in &data.observations {
                seen.observations.insert(observation_key(o));
            }
            for p in &data.prompts {
                seen.prompts.insert(prompt_key(p));
            }
        }
        Ok(seen)
    }
}

#[derive(Default)]
struct SeenKeys {
    sessions: HashSet<String>,
    observations: HashSet<String>,
    prompts: HashSet<String>,
}

// Imported rows receive fresh local ids, so identity across databases is
// judged by content, never by id.
fn observation_key(o: &Observation) -> String {
    format!("{}\x1f{}\x1f{}\x1f{}", o.session_id, o.created_at, o.title, o.content)
}

fn prompt_key(p: &Prompt) -> String {
    format!("{}\x1f{}\x1f{}", p.session_id, p.created_at, p.content)
}

fn chunk_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".json.gz").map(String::from)
}

/// Derive the chunk id: `<user>-<sha256[..12]>` over the canonical JSON
/// of the payload rows. The export timestamp is excluded so identical
/// payloads always hash to the same id.
fn chunk_id(username: &str, delta: &ExportData) -> Result<String> {
    let canonical =
        serde_json::to_vec(&(&delta.sessions, &delta.observations, &delta.prompts))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let digest = hex::encode(hasher.finalize());
    Ok(format!("{}-{}", sanitize_username(username), &digest[..12]))
}

fn filter_by_project(mut data: ExportData, project: Option<&str>) -> ExportData {
    let Some(project) = project.filter(|p| !p.is_empty()) else {
        return data;
    };

    data.sessions.retain(|s| s.project == project);
    let session_ids: HashSet<&str> = data.sessions.iter().map(|s| s.id.as_str()).collect();

    data.observations.retain(|o| {
        o.project.as_deref() == Some(project) || session_ids.contains(o.session_id.as_str())
    });
    data.prompts.retain(|p| {
        p.project.as_deref() == Some(project) || session_ids.contains(p.session_id.as_str())
    });
    data
}

fn sanitize_username(username: &str) -> String {
    let cleaned: String = username
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "anon".to_string()
    } else {
        cleaned
    }
}

/// Username for chunk provenance: ENGRAM_USER, then USER, then "anon"
pub fn get_username() -> String {
    std::env::var("ENGRAM_USER")
        .or_else(|_| std::env::var("USER"))
        .map(|u| sanitize_username(&u))
        .unwrap_or_else(|_| "anon".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Session;

    #[test]
    fn test_sanitize_username() {
        assert_eq!(sanitize_username("Alice Smith"), "alicesmith");
        assert_eq!(sanitize_username("bob-2"), "bob-2");
        assert_eq!(sanitize_username("!!!"), "anon");
    }

    #[test]
    fn test_chunk_id_deterministic() {
        let data = ExportData {
            version: "0.1.0".into(),
            exported_at: "2026-01-01 00:00:00".into(),
            sessions: vec![Session {
                id: "s1".into(),
                project: "acme".into(),
                directory: "/tmp".into(),
                started_at: "2026-01-01 00:00:00".into(),
                ended_at: None,
                summary: None,
            }],
            observations: vec![],
            prompts: vec![],
        };

        let a = chunk_id("u", &data).unwrap();
        let mut later = data.clone();
        later.exported_at = "2027-06-01 12:00:00".into();
        let b = chunk_id("u", &later).unwrap();
        // Same payload, different export time: same id.
        assert_eq!(a, b);
        assert!(a.starts_with("u-"));
        assert_eq!(a.len(), "u-".len() + 12);
    }

    #[test]
    fn test_chunk_id_from_path() {
        assert_eq!(
            chunk_id_from_path(Path::new("/x/chunks/u-abc.json.gz")),
            Some("u-abc".to_string())
        );
        assert_eq!(chunk_id_from_path(Path::new("/x/chunks/README.md")), None);
    }

    #[test]
    fn test_filter_by_project_keeps_session_rows() {
        let data = ExportData {
            version: "0.1.0".into(),
            exported_at: now_timestamp(),
            sessions: vec![
                Session {
                    id: "s1".into(),
                    project: "acme".into(),
                    directory: "/a".into(),
                    started_at: now_timestamp(),
                    ended_at: None,
                    summary: None,
                },
                Session {
                    id: "s2".into(),
                    project: "other".into(),
                    directory: "/b".into(),
                    started_at: now_timestamp(),
                    ended_at: None,
                    summary: None,
                },
            ],
            observations: vec![Observation {
                id: 1,
                session_id: "s1".into(),
                observation_type: "discovery".into(),
                title: "t".into(),
                content: "c".into(),
                tool_name: None,
                project: None,
                created_at: now_timestamp(),
            }],
            prompts: vec![],
        };

        let filtered = filter_by_project(data, Some("acme"));
        assert_eq!(filtered.sessions.len(), 1);
        // The observation has no denormalized project but belongs to an
        // acme session, so it travels with it.
        assert_eq!(filtered.observations.len(), 1);
    }
}
