//! Conversation orchestration: routing, agent dispatch and the human feedback
//! loop, with explicit suspend/resume through the checkpoint store.

pub mod error;
pub mod feedback;
pub mod machine;
pub mod state;

pub use error::GraphError;
pub use machine::{ConversationGraph, RunOutcome};
#[allow(unused_imports)]
pub use state::{
    ChatTurn, Continuation, ConversationState, InterruptRequest, Route, TurnRole,
    CLARIFICATION_MESSAGE, SATISFACTION_MESSAGE,
};
