//! Google Gemini provider (`generateContent` API).

use crate::providers::traits::{
    ChatRequest, ChatResponse, ConversationMessage, Provider, ToolCall,
};
use crate::tools::ToolSpec;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("has_key", &self.api_key.is_some())
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(base_url: Option<&str>, api_key: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }
}

/// Split a transcript into Gemini's separate system instruction and contents.
fn to_gemini_request(
    messages: &[ConversationMessage],
    tools: Option<&[ToolSpec]>,
    temperature: f64,
) -> GenerateRequest {
    let mut system_parts = Vec::new();
    let mut contents: Vec<GeminiContent> = Vec::new();

    for message in messages {
        match message {
            ConversationMessage::Chat(chat) if chat.role == "system" => {
                system_parts.push(GeminiPart::Text {
                    text: chat.content.clone(),
                });
            }
            ConversationMessage::Chat(chat) => {
                let role = if chat.role == "assistant" { "model" } else { "user" };
                contents.push(GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart::Text {
                        text: chat.content.clone(),
                    }],
                });
            }
            ConversationMessage::AssistantToolCalls { text, tool_calls } => {
                let mut parts = Vec::new();
                if let Some(text) = text.as_deref().filter(|t| !t.trim().is_empty()) {
                    parts.push(GeminiPart::Text {
                        text: text.to_string(),
                    });
                }
                for call in tool_calls {
                    let args = serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
                    parts.push(GeminiPart::FunctionCall {
                        function_call: GeminiFunctionCall {
                            name: call.name.clone(),
                            args,
                        },
                    });
                }
                contents.push(GeminiContent {
                    role: "model".into(),
                    parts,
                });
            }
            ConversationMessage::ToolResults(results) => {
                contents.push(GeminiContent {
                    role: "user".into(),
                    parts: results
                        .iter()
                        .map(|r| GeminiPart::FunctionResponse {
                            function_response: GeminiFunctionResponse {
                                name: r.name.clone(),
                                response: serde_json::json!({ "result": r.content }),
                            },
                        })
                        .collect(),
                });
            }
        }
    }

    let tools = match tools {
        Some(specs) if !specs.is_empty() => vec![GeminiToolDecl {
            function_declarations: specs
                .iter()
                .map(|s| GeminiFunctionDeclaration {
                    name: s.name.clone(),
                    description: s.description.clone(),
                    parameters: s.parameters.clone(),
                })
                .collect(),
        }],
        _ => Vec::new(),
    };

    GenerateRequest {
        contents,
        system_instruction: if system_parts.is_empty() {
            None
        } else {
            Some(GeminiSystemInstruction {
                parts: system_parts,
            })
        },
        tools,
        generation_config: GenerationConfig { temperature },
    }
}

fn from_gemini_response(resp: GenerateResponse) -> anyhow::Result<ChatResponse> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Gemini response had no candidates"))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        match part {
            GeminiPart::Text { text: t } => text.push_str(&t),
            GeminiPart::FunctionCall { function_call } => tool_calls.push(ToolCall {
                id: format!("gemini_{}_{}", function_call.name, tool_calls.len()),
                name: function_call.name,
                arguments: function_call.args.to_string(),
            }),
            GeminiPart::FunctionResponse { .. } => {}
        }
    }

    Ok(ChatResponse {
        text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
    })
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn chat(
        &self,
        request: ChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ChatResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "gemini API key not set. Add api_key to config.toml or set GEMINI_API_KEY."
            )
        })?;

        let body = to_gemini_request(request.messages, request.tools, temperature);
        tracing::debug!(
            model,
            contents = body.contents.len(),
            tools = body.tools.len(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Gemini API")?;

        if !response.status().is_success() {
            return Err(super::api_error("gemini", response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini API response")?;

        from_gemini_response(parsed)
    }

    fn supports_native_tools(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ── Gemini wire types ──

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiToolDecl>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolDecl {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}
