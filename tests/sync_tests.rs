//! Chunk export/import round trips through a sync directory
//!
//! Run with: cargo test --test sync_tests

use engram::storage::{add_observation, add_prompt, create_session, stats, Storage};
use engram::sync::SyncEngine;
use engram::types::{AddObservationParams, AddPromptParams, Config};
use tempfile::tempdir;

fn open_store(dir: &std::path::Path) -> Storage {
    Storage::open(Config {
        data_dir: dir.to_path_buf(),
        ..Config::default()
    })
    .unwrap()
}

fn seed(storage: &Storage, project: &str) {
    storage
        .with_connection(|conn| {
            create_session(conn, &format!("{project}-s1"), project, "/tmp")?;
            add_observation(
                conn,
                storage.config(),
                &AddObservationParams {
                    session_id: format!("{project}-s1"),
                    observation_type: "bugfix".into(),
                    title: "Fix N+1".into(),
                    content: "Batch loaded users".into(),
                    tool_name: None,
                    project: Some(project.into()),
                },
            )?;
            add_prompt(
                conn,
                storage.config(),
                &AddPromptParams {
                    session_id: format!("{project}-s1"),
                    content: "speed it up".into(),
                    project: Some(project.into()),
                },
            )?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn export_then_reexport_is_empty() {
    let data_dir = tempdir().unwrap();
    let sync_dir = tempdir().unwrap();

    let storage = open_store(data_dir.path());
    seed(&storage, "acme");

    let engine = SyncEngine::new(storage, sync_dir.path());
    let first = engine.export("u", Some("acme")).unwrap();
    assert!(!first.is_empty);
    assert_eq!(first.sessions_exported, 1);
    assert_eq!(first.observations_exported, 1);
    assert_eq!(first.prompts_exported, 1);
    assert!(sync_dir
        .path()
        .join("chunks")
        .join(format!("{}.json.gz", first.chunk_id))
        .exists());
    assert!(sync_dir.path().join("manifest.json").exists());

    let second = engine.export("u", Some("acme")).unwrap();
    assert!(second.is_empty);
}

#[test]
fn fresh_database_imports_once() {
    let source_dir = tempdir().unwrap();
    let sync_dir = tempdir().unwrap();

    let source = open_store(source_dir.path());
    seed(&source, "acme");
    SyncEngine::new(source, sync_dir.path())
        .export("u", Some("acme"))
        .unwrap();

    // A second machine pulls the repository and imports.
    let target_dir = tempdir().unwrap();
    let target = open_store(target_dir.path());
    let engine = SyncEngine::new(target.clone(), sync_dir.path());

    let first = engine.import().unwrap();
    assert_eq!(first.chunks_imported, 1);
    assert_eq!(first.chunks_skipped, 0);
    assert_eq!(first.sessions_imported, 1);
    assert_eq!(first.observations_imported, 1);
    assert_eq!(first.prompts_imported, 1);

    let second = engine.import().unwrap();
    assert_eq!(second.chunks_imported, 0);
    assert_eq!(second.chunks_skipped, 1);

    let s = target.with_connection(stats).unwrap();
    assert_eq!(s.total_observations, 1);
    assert_eq!(s.total_prompts, 1);
}

#[test]
fn status_reports_pending_chunks() {
    let source_dir = tempdir().unwrap();
    let sync_dir = tempdir().unwrap();

    let source = open_store(source_dir.path());
    seed(&source, "acme");
    let source_engine = SyncEngine::new(source.clone(), sync_dir.path());
    source_engine.export("u", Some("acme")).unwrap();

    // The exporter has seen its own chunk.
    let status = source_engine.status().unwrap();
    assert_eq!(status.local_chunks, 1);
    assert_eq!(status.remote_chunks, 1);
    assert_eq!(status.pending_import, 0);

    // A fresh database sees it as pending.
    let target_dir = tempdir().unwrap();
    let target = open_store(target_dir.path());
    let target_engine = SyncEngine::new(target, sync_dir.path());
    let status = target_engine.status().unwrap();
    assert_eq!(status.local_chunks, 0);
    assert_eq!(status.remote_chunks, 1);
    assert_eq!(status.pending_import, 1);
}

#[test]
fn project_filter_excludes_other_projects() {
    let data_dir = tempdir().unwrap();
    let sync_dir = tempdir().unwrap();

    let storage = open_store(data_dir.path());
    seed(&storage, "acme");
    seed(&storage, "other");

    let engine = SyncEngine::new(storage, sync_dir.path());
    let result = engine.export("u", Some("acme")).unwrap();
    assert_eq!(result.sessions_exported, 1);
    assert_eq!(result.observations_exported, 1);

    // The unfiltered export picks up the remaining project.
    let rest = engine.export("u", None).unwrap();
    assert!(!rest.is_empty);
    assert_eq!(rest.sessions_exported, 1);
    assert_eq!(rest.observations_exported, 1);
}

#[test]
fn reimport_into_source_skips_own_rows() {
    let data_dir = tempdir().unwrap();
    let sync_dir = tempdir().unwrap();

    let storage = open_store(data_dir.path());
    seed(&storage, "acme");

    let engine = SyncEngine::new(storage.clone(), sync_dir.path());
    engine.export("u", Some("acme")).unwrap();

    // The exporting database recorded the chunk id, so a local import
    // pass never duplicates its own rows.
    let outcome = engine.import().unwrap();
    assert_eq!(outcome.chunks_imported, 0);
    assert_eq!(outcome.chunks_skipped, 1);

    let s = storage.with_connection(stats).unwrap();
    assert_eq!(s.total_observations, 1);
}
