//! Human feedback node: decides what to ask and how to interpret the answer.

use super::state::{ConversationState, InterruptRequest, Route};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfaction {
    Yes,
    No,
    Unrecognized,
}

pub fn parse_satisfaction(answer: &str) -> Satisfaction {
    match answer.trim().to_lowercase().as_str() {
        "yes" => Satisfaction::Yes,
        "no" => Satisfaction::No,
        _ => Satisfaction::Unrecognized,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackDecision {
    /// Suspend again and ask for clarification text.
    AskClarification,
    /// Feedback step finished; follow this edge.
    Continue(Route),
}

/// The question to suspend on when entering the feedback node, `None` when
/// both rounds are already recorded.
pub fn pending_request(state: &ConversationState) -> Option<InterruptRequest> {
    if !state.feedback_received {
        Some(InterruptRequest::satisfaction(state))
    } else if !state.clarification_received {
        Some(InterruptRequest::clarification())
    } else {
        None
    }
}

fn finish(state: &mut ConversationState, route: Route) -> Route {
    state.reset_feedback_flags();
    state.next = Some(route);
    route
}

/// Apply the answer to a satisfaction check.
pub fn on_satisfaction(state: &mut ConversationState, answer: &str) -> FeedbackDecision {
    match parse_satisfaction(answer) {
        Satisfaction::Yes => {
            info!("User satisfied, ending conversation");
            FeedbackDecision::Continue(finish(state, Route::End))
        }
        Satisfaction::No => {
            info!("User not satisfied, requesting clarification");
            state.feedback_received = true;
            FeedbackDecision::AskClarification
        }
        Satisfaction::Unrecognized => {
            info!(answer = %answer.trim(), "Unrecognized feedback, ending conversation");
            FeedbackDecision::Continue(finish(state, Route::End))
        }
    }
}

/// Apply clarification text. Non-empty text is appended to the query and the
/// conversation goes back to the router.
pub fn on_clarification(state: &mut ConversationState, text: &str) -> Route {
    let text = text.trim();
    if text.is_empty() {
        info!("Empty clarification, ending conversation");
        return finish(state, Route::End);
    }

    state.query.push_str(". Clarification: ");
    state.query.push_str(text);
    state.clarification_received = true;
    info!(query = %state.query, "Clarification received, re-routing");
    finish(state, Route::Router)
}
