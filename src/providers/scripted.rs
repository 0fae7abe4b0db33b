//! Deterministic provider used by unit tests across the crate.

use super::traits::{ChatRequest, ChatResponse, ConversationMessage, Provider, ToolCall};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Replays queued replies in order; once the queue is empty it repeats the
/// fallback reply (or fails when none is set).
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatResponse, String>>>,
    fallback: Option<ChatResponse>,
    requests: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn constant(text: &str) -> Self {
        let mut p = Self::new();
        p.fallback = Some(text_reply(text));
        p
    }

    pub fn push_text(self, text: &str) -> Self {
        self.replies.lock().push_back(Ok(text_reply(text)));
        self
    }

    pub fn push_tool_call(self, name: &str, arguments: serde_json::Value) -> Self {
        self.push_reply_with_tool_call(None, name, arguments)
    }

    /// A tool call that also carries assistant text.
    pub fn push_tool_call_with_text(
        self,
        text: &str,
        name: &str,
        arguments: serde_json::Value,
    ) -> Self {
        self.push_reply_with_tool_call(Some(text), name, arguments)
    }

    fn push_reply_with_tool_call(
        self,
        text: Option<&str>,
        name: &str,
        arguments: serde_json::Value,
    ) -> Self {
        let id = format!("call_{}", self.replies.lock().len());
        self.replies.lock().push_back(Ok(ChatResponse {
            text: text.map(str::to_string),
            tool_calls: vec![ToolCall {
                id,
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }));
        self
    }

    pub fn push_error(self, message: &str) -> Self {
        self.replies.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<Vec<ConversationMessage>> {
        self.requests.lock().clone()
    }
}

fn text_reply(text: &str) -> ChatResponse {
    ChatResponse {
        text: Some(text.to_string()),
        tool_calls: vec![],
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(
        &self,
        request: ChatRequest<'_>,
        _model: &str,
        _temperature: f64,
    ) -> Result<ChatResponse> {
        self.requests.lock().push(request.messages.to_vec());
        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| anyhow::anyhow!("scripted provider exhausted")),
        }
    }

    fn supports_native_tools(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
