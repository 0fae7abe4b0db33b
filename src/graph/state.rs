//! Conversation state carried between graph nodes and persisted in checkpoints.

use crate::agent::Category;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SATISFACTION_MESSAGE: &str = "Was the response helpful? (yes/no)";
pub const CLARIFICATION_MESSAGE: &str =
    "Please provide what you were expecting or how I can improve the response:";

/// Next node to visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Route {
    Router,
    Agent(Category),
    End,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Router => "router",
            Route::Agent(category) => category.as_str(),
            Route::End => "end",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "router" => Ok(Route::Router),
            "end" => Ok(Route::End),
            other => other
                .parse::<Category>()
                .map(Route::Agent)
                .map_err(|_| anyhow::anyhow!("unknown route: '{other}'")),
        }
    }
}

impl From<Route> for String {
    fn from(route: Route) -> Self {
        route.as_str().to_string()
    }
}

impl TryFrom<String> for Route {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Human,
    Agent,
}

/// One entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Human,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub query: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub next: Option<Route>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub feedback_received: bool,
    #[serde(default)]
    pub clarification_received: bool,
}

impl ConversationState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Start from an earlier transcript (e.g. the thread's previous checkpoint).
    pub fn with_history(mut self, chat_history: Vec<ChatTurn>) -> Self {
        self.chat_history = chat_history;
        self
    }

    /// Edge selection view of `next`: unset reads as `End`.
    pub fn next_route(&self) -> Route {
        self.next.unwrap_or(Route::End)
    }

    /// Record one agent run: the query it answered and its response.
    pub fn record_exchange(&mut self, response: String) {
        self.chat_history.push(ChatTurn::human(self.query.clone()));
        self.chat_history.push(ChatTurn::agent(response.clone()));
        self.response = response;
    }

    pub fn reset_feedback_flags(&mut self) {
        self.feedback_received = false;
        self.clarification_received = false;
    }
}

/// What the machine asks the human when it suspends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterruptRequest {
    SatisfactionCheck {
        response: String,
        query: String,
        message: String,
    },
    ClarificationRequest {
        message: String,
    },
}

impl InterruptRequest {
    pub fn satisfaction(state: &ConversationState) -> Self {
        InterruptRequest::SatisfactionCheck {
            response: state.response.clone(),
            query: state.query.clone(),
            message: SATISFACTION_MESSAGE.to_string(),
        }
    }

    pub fn clarification() -> Self {
        InterruptRequest::ClarificationRequest {
            message: CLARIFICATION_MESSAGE.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            InterruptRequest::SatisfactionCheck { message, .. }
            | InterruptRequest::ClarificationRequest { message } => message,
        }
    }

    /// Where the machine is parked while this request is outstanding.
    pub fn position(&self) -> Continuation {
        match self {
            InterruptRequest::SatisfactionCheck { .. } => Continuation::AwaitingSatisfaction,
            InterruptRequest::ClarificationRequest { .. } => Continuation::AwaitingClarification,
        }
    }

    /// Rebuild the outstanding request from a stored position.
    pub fn for_position(position: Continuation, state: &ConversationState) -> Option<Self> {
        match position {
            Continuation::AwaitingSatisfaction => Some(Self::satisfaction(state)),
            Continuation::AwaitingClarification => Some(Self::clarification()),
            Continuation::Running | Continuation::Completed => None,
        }
    }
}

/// Explicit suspension point stored with each checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuation {
    Running,
    AwaitingSatisfaction,
    AwaitingClarification,
    Completed,
}

impl Continuation {
    pub fn as_str(self) -> &'static str {
        match self {
            Continuation::Running => "running",
            Continuation::AwaitingSatisfaction => "awaiting_satisfaction",
            Continuation::AwaitingClarification => "awaiting_clarification",
            Continuation::Completed => "completed",
        }
    }

    pub fn is_suspended(self) -> bool {
        matches!(
            self,
            Continuation::AwaitingSatisfaction | Continuation::AwaitingClarification
        )
    }
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Continuation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Continuation::Running),
            "awaiting_satisfaction" => Ok(Continuation::AwaitingSatisfaction),
            "awaiting_clarification" => Ok(Continuation::AwaitingClarification),
            "completed" => Ok(Continuation::Completed),
            other => anyhow::bail!("unknown continuation: '{other}'"),
        }
    }
}
