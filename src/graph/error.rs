use super::state::Continuation;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("no checkpoint found for thread '{0}'")]
    ThreadNotFound(String),

    #[error("thread '{thread_id}' is not waiting for input (position: {position})")]
    NotSuspended {
        thread_id: String,
        position: Continuation,
    },

    #[error("thread '{0}' is already running")]
    ThreadBusy(String),

    #[error("checkpoint store error: {0:#}")]
    Checkpoint(#[source] anyhow::Error),
}
