//! In-memory checkpoint store implementation.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::traits::{Checkpoint, CheckpointStore};

/// A checkpoint store backed by a mutex-protected hash map. Lost on exit.
pub struct InMemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            checkpoints: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.lock();
        checkpoints.insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let checkpoints = self.checkpoints.lock();
        Ok(checkpoints.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        let mut checkpoints = self.checkpoints.lock();
        Ok(checkpoints.remove(thread_id).is_some())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Checkpoint>> {
        let checkpoints = self.checkpoints.lock();
        let mut results: Vec<Checkpoint> = checkpoints.values().cloned().collect();
        results.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        results.truncate(limit);
        Ok(results)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
