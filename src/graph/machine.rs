//! The conversation state machine: Router → Agent → HumanFeedback → (Router | End).

use super::error::GraphError;
use super::feedback::{on_clarification, on_satisfaction, pending_request, FeedbackDecision};
use super::state::{Continuation, ConversationState, InterruptRequest, Route};
use crate::agent::{AgentRoster, QueryClassifier};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Result of driving the machine until it can go no further without the human.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Interrupted {
        request: InterruptRequest,
        state: ConversationState,
    },
    Completed(ConversationState),
}

impl RunOutcome {
    pub fn state(&self) -> &ConversationState {
        match self {
            RunOutcome::Interrupted { state, .. } | RunOutcome::Completed(state) => state,
        }
    }
}

/// Marks a thread as in flight until dropped.
struct ThreadLease {
    thread_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.thread_id);
    }
}

#[derive(Clone)]
pub struct ConversationGraph {
    classifier: Arc<dyn QueryClassifier>,
    roster: AgentRoster,
    store: Arc<dyn CheckpointStore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ConversationGraph {
    pub fn new(
        classifier: Arc<dyn QueryClassifier>,
        roster: AgentRoster,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            classifier,
            roster,
            store,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn acquire(&self, thread_id: &str) -> Result<ThreadLease, GraphError> {
        if !self.in_flight.lock().insert(thread_id.to_string()) {
            return Err(GraphError::ThreadBusy(thread_id.to_string()));
        }
        Ok(ThreadLease {
            thread_id: thread_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    async fn save(
        &self,
        thread_id: &str,
        state: &ConversationState,
        position: Continuation,
    ) -> Result<(), GraphError> {
        self.store
            .save(&Checkpoint::new(thread_id, state.clone(), position))
            .await
            .map_err(GraphError::Checkpoint)
    }

    /// Run a new query from the Router until the first suspension or `End`.
    pub async fn start(
        &self,
        thread_id: &str,
        mut state: ConversationState,
    ) -> Result<RunOutcome, GraphError> {
        let _lease = self.acquire(thread_id)?;
        info!(thread_id, "Starting conversation run");
        state.next = Some(Route::Router);
        self.save(thread_id, &state, Continuation::Running).await?;
        self.run_from_router(thread_id, state).await
    }

    /// Supply the human's answer to a suspended thread and continue.
    pub async fn resume(&self, thread_id: &str, answer: &str) -> Result<RunOutcome, GraphError> {
        let _lease = self.acquire(thread_id)?;
        let checkpoint = self
            .store
            .load(thread_id)
            .await
            .map_err(GraphError::Checkpoint)?
            .ok_or_else(|| GraphError::ThreadNotFound(thread_id.to_string()))?;

        let mut state = checkpoint.state;
        info!(thread_id, position = %checkpoint.position, "Resuming conversation");
        let route = match checkpoint.position {
            Continuation::AwaitingSatisfaction => match on_satisfaction(&mut state, answer) {
                FeedbackDecision::AskClarification => {
                    return self
                        .suspend(thread_id, state, InterruptRequest::clarification())
                        .await;
                }
                FeedbackDecision::Continue(route) => route,
            },
            Continuation::AwaitingClarification => on_clarification(&mut state, answer),
            position @ (Continuation::Running | Continuation::Completed) => {
                return Err(GraphError::NotSuspended {
                    thread_id: thread_id.to_string(),
                    position,
                });
            }
        };

        self.follow_feedback_edge(thread_id, state, route).await
    }

    /// Latest checkpoint for a thread.
    pub async fn state(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        self.store
            .load(thread_id)
            .await
            .map_err(GraphError::Checkpoint)
    }

    /// Router → Agent → HumanFeedback.
    async fn run_from_router(
        &self,
        thread_id: &str,
        mut state: ConversationState,
    ) -> Result<RunOutcome, GraphError> {
        let category = self.classifier.classify(&state.query).await;
        info!(thread_id, category = %category, "Routing query");
        state.next = Some(Route::Agent(category));

        let response = self.roster.get(category).run(&state.query).await;
        state.record_exchange(response);

        match pending_request(&state) {
            Some(request) => self.suspend(thread_id, state, request).await,
            None => {
                state.reset_feedback_flags();
                state.next = Some(Route::End);
                self.complete(thread_id, state).await
            }
        }
    }

    async fn follow_feedback_edge(
        &self,
        thread_id: &str,
        state: ConversationState,
        route: Route,
    ) -> Result<RunOutcome, GraphError> {
        match route {
            Route::Router => self.run_from_router(thread_id, state).await,
            _ => self.complete(thread_id, state).await,
        }
    }

    async fn suspend(
        &self,
        thread_id: &str,
        state: ConversationState,
        request: InterruptRequest,
    ) -> Result<RunOutcome, GraphError> {
        self.save(thread_id, &state, request.position()).await?;
        info!(thread_id, position = %request.position(), "Waiting for human input");
        Ok(RunOutcome::Interrupted { request, state })
    }

    async fn complete(
        &self,
        thread_id: &str,
        state: ConversationState,
    ) -> Result<RunOutcome, GraphError> {
        self.save(thread_id, &state, Continuation::Completed).await?;
        info!(thread_id, "Conversation completed");
        Ok(RunOutcome::Completed(state))
    }
}
