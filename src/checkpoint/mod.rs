//! Checkpoint persistence for suspended and finished conversation threads.

pub mod in_memory;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;
pub use traits::{Checkpoint, CheckpointStore};

use crate::config::{CheckpointConfig, Config};
use crate::graph::InterruptRequest;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_DB_FILE: &str = "checkpoints.db";

/// Resolved database path: explicit config path, else `<workspace>/checkpoints.db`.
pub fn database_path(config: &CheckpointConfig, workspace_dir: &Path) -> PathBuf {
    config
        .path
        .clone()
        .unwrap_or_else(|| workspace_dir.join(DEFAULT_DB_FILE))
}

/// Factory: create the configured checkpoint backend.
pub fn create_checkpoint_store(
    config: &CheckpointConfig,
    workspace_dir: &Path,
) -> Result<Arc<dyn CheckpointStore>> {
    match config.backend.trim().to_ascii_lowercase().as_str() {
        "memory" => Ok(Arc::new(InMemoryCheckpointStore::new())),
        "sqlite" => Ok(Arc::new(SqliteCheckpointStore::open(&database_path(
            config,
            workspace_dir,
        ))?)),
        other => anyhow::bail!("Unknown checkpoint backend: {other}. Supported: sqlite, memory."),
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or(text);
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

// ── CLI handler ──

/// Handle `routebot threads <subcommand>` CLI commands.
pub async fn handle_thread_command(command: crate::ThreadCommands, config: &Config) -> Result<()> {
    let store = create_checkpoint_store(&config.checkpoint, &config.workspace_dir)?;
    match command {
        crate::ThreadCommands::List { limit } => {
            let checkpoints = store.list(limit).await?;
            if checkpoints.is_empty() {
                println!("No threads found.");
                return Ok(());
            }
            println!("Threads ({} shown, backend: {}):\n", checkpoints.len(), store.name());
            for cp in &checkpoints {
                let marker = if cp.position.is_suspended() {
                    " (waiting for input)"
                } else {
                    ""
                };
                println!(
                    "- {} [{}]{marker} {}",
                    cp.thread_id,
                    cp.position,
                    cp.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                println!("    {}", preview(&cp.state.query, 80));
            }
        }
        crate::ThreadCommands::Show { thread_id } => {
            let Some(cp) = store.load(&thread_id).await? else {
                println!("No thread found with id: {thread_id}");
                return Ok(());
            };
            println!("Thread:    {}", cp.thread_id);
            println!("Position:  {}", cp.position);
            println!("Updated:   {}", cp.updated_at.to_rfc3339());
            println!("Query:     {}", cp.state.query);
            if let Some(next) = cp.state.next {
                println!("Next:      {next}");
            }
            if let Some(request) = InterruptRequest::for_position(cp.position, &cp.state) {
                println!("Pending:   {}", request.message());
                println!(
                    "           (answer with: routebot resume --thread {} <answer>)",
                    cp.thread_id
                );
            }
            println!("\nHistory ({} turns):", cp.state.chat_history.len());
            for turn in &cp.state.chat_history {
                let role = match turn.role {
                    crate::graph::TurnRole::Human => "human",
                    crate::graph::TurnRole::Agent => "agent",
                };
                println!("  {role}: {}", preview(&turn.content, 100));
            }
        }
        crate::ThreadCommands::Delete { thread_id, yes } => {
            if !yes {
                eprintln!("Use --yes to confirm deletion of thread '{thread_id}'.");
                return Ok(());
            }
            if store.delete(&thread_id).await? {
                println!("✓ Deleted thread: {thread_id}");
            } else {
                println!("No thread found with id: {thread_id}");
            }
        }
    }
    Ok(())
}
