//! SQLite checkpoint store: one row per thread, state stored as JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::traits::{Checkpoint, CheckpointStore};
use crate::graph::{Continuation, ConversationState};

pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create checkpoint directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open checkpoint database: {}", path.display()))?;
        init_tables(&conn)?;
        info!(path = %path.display(), "Checkpoint store ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .context("Checkpoint store task panicked")?
    }
}

/// Create the checkpoint table if it does not exist. Safe to call repeatedly.
fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            thread_id TEXT PRIMARY KEY,
            position TEXT NOT NULL,
            state_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create checkpoints table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_checkpoints_updated_at ON checkpoints(updated_at)",
        [],
    )
    .context("Failed to create checkpoints updated_at index")?;

    Ok(())
}

type Row = (String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_row((thread_id, position, state_json, updated_at): Row) -> Result<Checkpoint> {
    let state = serde_json::from_str::<ConversationState>(&state_json)
        .with_context(|| format!("Corrupt state for thread {thread_id}"))?;
    let position = position
        .parse::<Continuation>()
        .with_context(|| format!("Corrupt position for thread {thread_id}"))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .with_context(|| format!("Corrupt updated_at for thread {thread_id}"))?
        .with_timezone(&Utc);
    Ok(Checkpoint {
        thread_id,
        state,
        position,
        updated_at,
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let state_json =
            serde_json::to_string(&checkpoint.state).context("Failed to serialize state")?;
        let thread_id = checkpoint.thread_id.clone();
        let position = checkpoint.position.as_str();
        // Fixed-width timestamps keep ORDER BY updated_at chronological.
        let updated_at = checkpoint
            .updated_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (thread_id, position, state_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    position = excluded.position,
                    state_json = excluded.state_json,
                    updated_at = excluded.updated_at",
                params![&thread_id, position, &state_json, &updated_at],
            )
            .context("Failed to save checkpoint")?;
            debug!(thread_id = %thread_id, position, "Saved checkpoint");
            Ok(())
        })
        .await
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let thread_id = thread_id.to_string();
        let row = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT thread_id, position, state_json, updated_at
                     FROM checkpoints WHERE thread_id = ?1",
                    params![&thread_id],
                    read_row,
                )
                .optional()
                .context("Failed to load checkpoint")
            })
            .await?;
        row.map(decode_row).transpose()
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let thread_id = thread_id.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM checkpoints WHERE thread_id = ?1",
                    params![&thread_id],
                )
                .context("Failed to delete checkpoint")?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list(&self, limit: usize) -> Result<Vec<Checkpoint>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT thread_id, position, state_json, updated_at
                         FROM checkpoints ORDER BY updated_at DESC LIMIT ?1",
                    )
                    .context("Failed to prepare checkpoint listing")?;
                let rows = stmt
                    .query_map(params![limit], read_row)
                    .context("Failed to list checkpoints")?
                    .collect::<rusqlite::Result<Vec<Row>>>()
                    .context("Failed to read checkpoint row")?;
                Ok(rows)
            })
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match decode_row(row) {
                Ok(checkpoint) => Some(checkpoint),
                Err(e) => {
                    warn!("Skipping unreadable checkpoint: {e:#}");
                    None
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
