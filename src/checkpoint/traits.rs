//! Checkpoint storage traits and types for suspended conversations.

use crate::graph::{Continuation, ConversationState};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest snapshot of one conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: ConversationState,
    pub position: Continuation,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: &str, state: ConversationState, position: Continuation) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            state,
            position,
            updated_at: Utc::now(),
        }
    }
}

/// Durable store of conversation checkpoints, one per thread id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Insert or overwrite the checkpoint for `checkpoint.thread_id`.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Latest checkpoint for a thread, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// Remove a thread. Returns whether it existed.
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// Most recently updated checkpoints first.
    async fn list(&self, limit: usize) -> Result<Vec<Checkpoint>>;

    /// The name of this store implementation.
    fn name(&self) -> &str;
}
