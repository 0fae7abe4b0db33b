//! Bounded tool-use loop shared by every domain agent.

use crate::providers::{
    ChatMessage, ChatRequest, ConversationMessage, Provider, ToolCall, ToolResultMessage,
};
use crate::tools::{Tool, ToolSpec};
use anyhow::Result;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
pub const DEFAULT_MAX_TOOL_OUTPUT_CHARS: usize = 20_000;

/// Returned when neither the model nor any tool produced text.
pub const NO_OUTPUT_MESSAGE: &str = "⚠️ No valid AI response or tool output found.";

const TRUNCATION_MARKER: &str = "\n[Output truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopLimits {
    pub max_iterations: usize,
    pub max_output_chars: usize,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            max_output_chars: DEFAULT_MAX_TOOL_OUTPUT_CHARS,
        }
    }
}

impl LoopLimits {
    /// `0` in either field means "use the default".
    pub fn new(max_iterations: usize, max_output_chars: usize) -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: if max_iterations == 0 {
                defaults.max_iterations
            } else {
                max_iterations
            },
            max_output_chars: if max_output_chars == 0 {
                defaults.max_output_chars
            } else {
                max_output_chars
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub tool: String,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Final assistant text, or the best-effort substitute when the cap was hit.
    pub text: String,
    pub tool_outputs: Vec<ToolOutput>,
    pub iterations: usize,
    pub hit_iteration_cap: bool,
}

/// Cut `output` to at most `max_chars` characters, appending a marker when cut.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    match output.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &output[..byte_idx]),
        None => output.to_string(),
    }
}

/// Last assistant text, else joined tool outputs, else [`NO_OUTPUT_MESSAGE`].
/// At the iteration cap `tool_outputs` is never empty.
fn best_effort_text(last_text: Option<String>, tool_outputs: &[ToolOutput]) -> String {
    if let Some(text) = last_text {
        return text;
    }
    if !tool_outputs.is_empty() {
        return tool_outputs
            .iter()
            .map(|t| t.output.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
    }
    NO_OUTPUT_MESSAGE.to_string()
}

/// Run one tool call. Every failure mode becomes an `Error: ...` string.
async fn execute_tool_call(tools: &[Box<dyn Tool>], call: &ToolCall, max_chars: usize) -> String {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
        warn!(tool = %call.name, "Model requested an unknown tool");
        return format!("Error: unknown tool '{}'", call.name);
    };

    let args: serde_json::Value = if call.arguments.trim().is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return format!("Error: {}: invalid arguments: {e}", call.name),
        }
    };

    info!(tool = %call.name, "Executing tool");
    let output = match tool.execute(args).await {
        Ok(result) if result.success => result.output,
        Ok(result) => {
            let reason = result
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or(result.output);
            warn!(tool = %call.name, "Tool reported failure: {reason}");
            format!("Error: {}: {reason}", call.name)
        }
        Err(e) => {
            warn!(tool = %call.name, "Tool failed: {e}");
            format!("Error: {}: {e}", call.name)
        }
    };

    truncate_output(&output, max_chars)
}

/// Drive the model until it answers without requesting tools, or until the
/// iteration cap is reached. Provider errors propagate; tool errors do not.
#[allow(clippy::too_many_arguments)]
pub async fn run_tool_loop(
    provider: &dyn Provider,
    system_prompt: &str,
    query: &str,
    tools: &[Box<dyn Tool>],
    model: &str,
    temperature: f64,
    limits: LoopLimits,
) -> Result<LoopOutcome> {
    let limits = LoopLimits::new(limits.max_iterations, limits.max_output_chars);
    let specs: Vec<ToolSpec> = tools.iter().map(|t| t.spec()).collect();
    let offer_tools = !specs.is_empty() && provider.supports_native_tools();

    let mut history = vec![
        ConversationMessage::Chat(ChatMessage::system(system_prompt)),
        ConversationMessage::Chat(ChatMessage::user(query)),
    ];
    let mut tool_outputs: Vec<ToolOutput> = Vec::new();
    let mut last_text: Option<String> = None;

    for iteration in 1..=limits.max_iterations {
        debug!(iteration, messages = history.len(), "Tool loop iteration");

        let response = provider
            .chat(
                ChatRequest {
                    messages: &history,
                    tools: offer_tools.then_some(specs.as_slice()),
                },
                model,
                temperature,
            )
            .await?;

        if let Some(text) = response.text_or_none() {
            last_text = Some(text.to_string());
        }

        if !response.has_tool_calls() {
            let text = response
                .text_or_none()
                .map(str::to_string)
                .unwrap_or_else(|| best_effort_text(last_text.take(), &tool_outputs));
            return Ok(LoopOutcome {
                text,
                tool_outputs,
                iterations: iteration,
                hit_iteration_cap: false,
            });
        }

        history.push(ConversationMessage::AssistantToolCalls {
            text: response.text.clone(),
            tool_calls: response.tool_calls.clone(),
        });

        let mut results = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let output = execute_tool_call(tools, call, limits.max_output_chars).await;
            tool_outputs.push(ToolOutput {
                tool: call.name.clone(),
                output: output.clone(),
            });
            results.push(ToolResultMessage {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                content: output,
            });
        }
        history.push(ConversationMessage::ToolResults(results));
    }

    warn!(
        "Tool loop exceeded maximum iterations ({}), returning best-effort answer",
        limits.max_iterations
    );
    Ok(LoopOutcome {
        text: best_effort_text(last_text, &tool_outputs),
        tool_outputs,
        iterations: limits.max_iterations,
        hit_iteration_cap: true,
    })
}
