//! Engram CLI
//!
//! Command-line interface for the memory store: search, save, timeline,
//! context, stats, snapshot export/import, and repository sync.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use engram::error::Result;
use engram::storage::{self, Storage};
use engram::sync::{get_username, SyncEngine};
use engram::types::{
    AddObservationParams, Config, ExportData, SearchOptions, TimelineEntry,
};

#[derive(Parser)]
#[command(name = "engram")]
#[command(about = "Persistent memory for AI coding agents")]
#[command(version)]
struct Cli {
    /// Data directory holding engram.db
    #[arg(long, env = "ENGRAM_DATA_DIR", default_value = "~/.engram")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search memories
    Search {
        /// Search query
        query: Vec<String>,
        /// Filter by observation type
        #[arg(long)]
        r#type: Option<String>,
        /// Filter by project
        #[arg(long)]
        project: Option<String>,
        /// Maximum results
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Save a memory
    Save {
        /// Short title
        title: String,
        /// Content to remember
        content: String,
        /// Observation type
        #[arg(long, default_value = "manual")]
        r#type: String,
        /// Project name
        #[arg(long)]
        project: Option<String>,
    },
    /// Show chronological context around an observation
    Timeline {
        /// Observation id
        observation_id: i64,
        /// Observations before the pivot
        #[arg(long, default_value = "5")]
        before: i64,
        /// Observations after the pivot
        #[arg(long, default_value = "5")]
        after: i64,
    },
    /// Show recent context from previous sessions
    Context {
        /// Limit to one project
        project: Option<String>,
    },
    /// Show memory system statistics
    Stats,
    /// Export all memories to JSON
    Export {
        /// Output file
        #[arg(default_value = "engram-export.json")]
        file: PathBuf,
    },
    /// Import memories from a JSON export file
    Import {
        /// Input file
        file: PathBuf,
    },
    /// Export new memories as a compressed chunk to .engram/
    Sync {
        /// Import new chunks from .engram/ into the local database
        #[arg(long)]
        import: bool,
        /// Show sync status (local vs remote chunks)
        #[arg(long)]
        status: bool,
        /// Filter export to a specific project
        #[arg(long)]
        project: Option<String>,
        /// Export all projects (ignore the directory-based filter)
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("engram: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        data_dir: PathBuf::from(shellexpand::tilde(&cli.data_dir).into_owned()),
        ..Config::default()
    };
    let storage = Storage::open(config)?;

    match cli.command {
        Commands::Search {
            query,
            r#type,
            project,
            limit,
        } => {
            let query = query.join(" ");
            let opts = SearchOptions {
                observation_type: r#type,
                project,
                limit: Some(limit),
            };
            let results =
                storage.with_connection(|conn| storage::search(conn, storage.config(), &query, &opts))?;

            if results.is_empty() {
                println!("No memories found for: {query:?}");
                return Ok(());
            }

            println!("Found {} memories:\n", results.len());
            for (i, r) in results.iter().enumerate() {
                let obs = &r.observation;
                let project = obs
                    .project
                    .as_deref()
                    .map(|p| format!(" | project: {p}"))
                    .unwrap_or_default();
                println!(
                    "[{}] #{} ({}) — {}\n    {}\n    {}{}\n",
                    i + 1,
                    obs.id,
                    obs.observation_type,
                    obs.title,
                    truncate(&obs.content, 300),
                    obs.created_at,
                    project
                );
            }
        }

        Commands::Save {
            title,
            content,
            r#type,
            project,
        } => {
            let id = storage.with_connection(|conn| {
                storage::create_session(
                    conn,
                    "manual-save",
                    project.as_deref().unwrap_or(""),
                    "",
                )?;
                storage::add_observation(
                    conn,
                    storage.config(),
                    &AddObservationParams {
                        session_id: "manual-save".into(),
                        observation_type: r#type.clone(),
                        title: title.clone(),
                        content,
                        tool_name: None,
                        project,
                    },
                )
            })?;
            println!("Memory saved: #{} {:?} ({})", id, title, r#type);
        }

        Commands::Timeline {
            observation_id,
            before,
            after,
        } => {
            let result = storage
                .with_connection(|conn| storage::timeline(conn, observation_id, before, after))?;

            if let Some(sess) = &result.session_info {
                let summary = sess
                    .summary
                    .as_deref()
                    .map(|s| format!(" — {}", truncate(s, 100)))
                    .unwrap_or_default();
                println!("Session: {} ({}){}", sess.project, sess.started_at, summary);
                println!("Total observations in session: {}\n", result.total_in_range);
            }

            if !result.before.is_empty() {
                println!("─── Before ───");
                print_entries(&result.before);
                println!();
            }

            let focus = &result.focus;
            println!(
                ">>> #{} [{}] {} <<<",
                focus.id, focus.observation_type, focus.title
            );
            println!("    {}", truncate(&focus.content, 500));
            println!("    {}\n", focus.created_at);

            if !result.after.is_empty() {
                println!("─── After ───");
                print_entries(&result.after);
            }
        }

        Commands::Context { project } => {
            let context = storage.with_connection(|conn| {
                storage::format_context(conn, storage.config(), project.as_deref())
            })?;

            if context.is_empty() {
                println!("No previous session memories found.");
            } else {
                print!("{context}");
            }
        }

        Commands::Stats => {
            let stats = storage.with_connection(storage::stats)?;
            let projects = if stats.projects.is_empty() {
                "none yet".to_string()
            } else {
                stats.projects.join(", ")
            };

            println!("Engram Memory Stats");
            println!("  Sessions:     {}", stats.total_sessions);
            println!("  Observations: {}", stats.total_observations);
            println!("  Prompts:      {}", stats.total_prompts);
            println!("  Projects:     {projects}");
            println!(
                "  Database:     {}",
                storage.config().db_path().display()
            );
        }

        Commands::Export { file } => {
            let data = storage.with_connection(storage::export)?;
            std::fs::write(&file, serde_json::to_vec_pretty(&data)?)?;

            println!("Exported to {}", file.display());
            println!("  Sessions:     {}", data.sessions.len());
            println!("  Observations: {}", data.observations.len());
            println!("  Prompts:      {}", data.prompts.len());
        }

        Commands::Import { file } => {
            let raw = std::fs::read(&file)?;
            let data: ExportData = serde_json::from_slice(&raw)?;

            let result = storage.with_transaction(|conn| storage::import(conn, &data))?;

            println!("Imported from {}", file.display());
            println!("  Sessions:     {}", result.sessions_imported);
            println!("  Observations: {}", result.observations_imported);
            println!("  Prompts:      {}", result.prompts_imported);
        }

        Commands::Sync {
            import,
            status,
            project,
            all,
        } => {
            run_sync(storage, import, status, project, all)?;
        }
    }

    Ok(())
}

fn run_sync(
    storage: Storage,
    do_import: bool,
    do_status: bool,
    project: Option<String>,
    all: bool,
) -> Result<()> {
    // Sync only this project's memories unless told otherwise, so a
    // repository never carries unrelated projects from the global DB.
    let project = if all {
        None
    } else {
        project.or_else(|| {
            std::env::current_dir().ok().and_then(|cwd| {
                cwd.file_name().map(|n| n.to_string_lossy().into_owned())
            })
        })
    };

    let engine = SyncEngine::new(storage, ".engram");

    if do_status {
        let status = engine.status()?;
        println!("Sync status:");
        println!("  Local chunks:    {}", status.local_chunks);
        println!("  Remote chunks:   {}", status.remote_chunks);
        println!("  Pending import:  {}", status.pending_import);
        return Ok(());
    }

    if do_import {
        let result = engine.import()?;

        if result.chunks_imported == 0 {
            println!("Already up to date — no new chunks to import.");
            if result.chunks_skipped > 0 {
                println!("  ({} chunks already imported)", result.chunks_skipped);
            }
            return Ok(());
        }

        println!("Imported {} new chunk(s) from .engram/", result.chunks_imported);
        println!("  Sessions:     {}", result.sessions_imported);
        println!("  Observations: {}", result.observations_imported);
        println!("  Prompts:      {}", result.prompts_imported);
        if result.chunks_skipped > 0 {
            println!("  Skipped:      {} (already imported)", result.chunks_skipped);
        }
        return Ok(());
    }

    let username = get_username();
    match &project {
        Some(p) => println!("Exporting memories for project {p:?}..."),
        None => println!("Exporting ALL memories (all projects)..."),
    }

    let result = engine.export(&username, project.as_deref())?;

    if result.is_empty {
        match &project {
            Some(p) => println!(
                "Nothing new to sync for project {p:?} — all memories already exported."
            ),
            None => println!("Nothing new to sync — all memories already exported."),
        }
        return Ok(());
    }

    println!("Created chunk {}", result.chunk_id);
    println!("  Sessions:     {}", result.sessions_exported);
    println!("  Observations: {}", result.observations_exported);
    println!("  Prompts:      {}", result.prompts_exported);
    println!();
    println!("Add to git:");
    println!("  git add .engram/ && git commit -m \"sync engram memories\"");
    Ok(())
}

fn print_entries(entries: &[TimelineEntry]) {
    for e in entries {
        println!(
            "  #{} [{}] {} — {}",
            e.id,
            e.observation_type,
            e.title,
            truncate(&e.content, 150)
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.len() <= max {
        return first_line.to_string();
    }
    let mut end = max;
    while !first_line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &first_line[..end])
}
