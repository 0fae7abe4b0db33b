//! Generic OpenAI-compatible provider.
//! Most LLM APIs follow the same `/v1/chat/completions` format.
//! This module provides a single implementation that works for all of them.

use crate::providers::traits::{
    ChatRequest as ProviderChatRequest, ChatResponse as ProviderChatResponse,
    ConversationMessage, Provider, ToolCall as ProviderToolCall,
};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// A provider that speaks the OpenAI-compatible chat completions API.
/// Used by: OpenAI, OpenRouter, Groq, Mistral, local gateways, etc.
pub struct OpenAiCompatibleProvider {
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build the full URL for chat completions, detecting if base_url already includes the path.
    fn chat_completions_url(&self) -> String {
        let has_full_endpoint = reqwest::Url::parse(&self.base_url)
            .map(|url| {
                url.path()
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            })
            .unwrap_or_else(|_| {
                self.base_url
                    .trim_end_matches('/')
                    .ends_with("/chat/completions")
            });

        if has_full_endpoint {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDecl>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ToolDecl {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDecl,
}

#[derive(Debug, Serialize)]
struct FunctionDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct ToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    function: Option<Function>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Function {
    name: Option<String>,
    arguments: Option<String>,
}

fn to_api_messages(messages: &[ConversationMessage]) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            ConversationMessage::Chat(chat) => out.push(Message {
                role: chat.role.clone(),
                content: Some(chat.content.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            ConversationMessage::AssistantToolCalls { text, tool_calls } => out.push(Message {
                role: "assistant".into(),
                content: text.clone(),
                tool_calls: Some(
                    tool_calls
                        .iter()
                        .map(|tc| ToolCall {
                            id: Some(tc.id.clone()),
                            kind: Some("function".into()),
                            function: Some(Function {
                                name: Some(tc.name.clone()),
                                arguments: Some(tc.arguments.clone()),
                            }),
                        })
                        .collect(),
                ),
                tool_call_id: None,
            }),
            ConversationMessage::ToolResults(results) => {
                for result in results {
                    out.push(Message {
                        role: "tool".into(),
                        content: Some(result.content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(result.tool_call_id.clone()),
                    });
                }
            }
        }
    }
    out
}

fn to_api_tools(tools: Option<&[ToolSpec]>) -> Vec<ToolDecl> {
    tools
        .unwrap_or_default()
        .iter()
        .map(|spec| ToolDecl {
            kind: "function",
            function: FunctionDecl {
                name: spec.name.clone(),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        })
        .collect()
}

fn into_provider_response(message: ResponseMessage) -> ProviderChatResponse {
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tc| {
            let function = tc.function?;
            let name = function.name?;
            let arguments = function
                .arguments
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| "{}".to_string());
            Some(ProviderToolCall {
                id: tc.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name,
                arguments,
            })
        })
        .collect();

    ProviderChatResponse {
        text: message.content,
        tool_calls,
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        request: ProviderChatRequest<'_>,
        model: &str,
        temperature: f64,
    ) -> anyhow::Result<ProviderChatResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "{} API key not set. Add api_key to config.toml or set the appropriate env var.",
                self.name
            )
        })?;

        let body = ChatRequest {
            model: model.to_string(),
            messages: to_api_messages(request.messages),
            temperature,
            tools: to_api_tools(request.tools),
        };

        let url = self.chat_completions_url();
        tracing::debug!(
            provider = %self.name,
            model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(super::api_error(&self.name, response).await);
        }

        let chat_response: ApiChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| into_provider_response(c.message))
            .ok_or_else(|| anyhow::anyhow!("No response from {}", self.name))
    }

    fn supports_native_tools(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::traits::{ChatMessage, ToolResultMessage};

    fn make_provider(name: &str, url: &str, key: Option<&str>) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(name, url, key)
    }

    #[test]
    fn creates_with_key() {
        let p = make_provider("openrouter", "https://openrouter.ai/api/v1", Some("or-key"));
        assert_eq!(p.name, "openrouter");
        assert_eq!(p.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(p.api_key.as_deref(), Some("or-key"));
    }

    #[test]
    fn strips_trailing_slash() {
        let p = make_provider("test", "https://example.com/", None);
        assert_eq!(p.base_url, "https://example.com");
    }

    #[tokio::test]
    async fn chat_fails_without_key() {
        let p = make_provider("OpenAI", "https://api.openai.com/v1", None);
        let result = p.chat_with_system(None, "hello", "gpt-4o-mini", 0.7).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("OpenAI API key not set"));
    }

    #[test]
    fn request_serializes_tools_and_skips_empty() {
        let specs = vec![ToolSpec {
            name: "compare_products".into(),
            description: "Compare two products".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let with_tools = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            temperature: 0.2,
            tools: to_api_tools(Some(&specs)),
        };
        let json = serde_json::to_value(&with_tools).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "compare_products");

        let without_tools = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![],
            temperature: 0.2,
            tools: to_api_tools(None),
        };
        let json = serde_json::to_value(&without_tools).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn transcript_maps_tool_calls_and_results() {
        let transcript = vec![
            ConversationMessage::Chat(ChatMessage::user("compare a vs b")),
            ConversationMessage::AssistantToolCalls {
                text: None,
                tool_calls: vec![ProviderToolCall {
                    id: "call_1".into(),
                    name: "compare_products".into(),
                    arguments: r#"{"query":"a vs b"}"#.into(),
                }],
            },
            ConversationMessage::ToolResults(vec![ToolResultMessage {
                tool_call_id: "call_1".into(),
                name: "compare_products".into(),
                content: "a is cheaper".into(),
            }]),
        ];

        let messages = to_api_messages(&transcript);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert!(messages[1].content.is_none());
        assert_eq!(messages[2].role, "tool");
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn response_with_tool_calls_parses() {
        let json = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"call_9","type":"function","function":{"name":"handle_general_query","arguments":"{\"query\":\"hi\"}"}}
        ]}}]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        let parsed = into_provider_response(resp.choices.into_iter().next().unwrap().message);
        assert!(parsed.text.is_none());
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].id, "call_9");
        assert_eq!(parsed.tool_calls[0].name, "handle_general_query");
    }

    #[test]
    fn response_tool_call_without_arguments_defaults_to_empty_object() {
        let message = ResponseMessage {
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: None,
                kind: Some("function".into()),
                function: Some(Function {
                    name: Some("summarize_notes".into()),
                    arguments: None,
                }),
            }]),
        };
        let parsed = into_provider_response(message);
        assert_eq!(parsed.tool_calls[0].arguments, "{}");
        assert!(!parsed.tool_calls[0].id.is_empty());
    }

    #[test]
    fn response_deserializes_plain_text() {
        let json = r#"{"choices":[{"message":{"content":"Paris"}}]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content, Some("Paris".to_string()));
    }

    #[test]
    fn response_empty_choices() {
        let json = r#"{"choices":[]}"#;
        let resp: ApiChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices.is_empty());
    }

    #[test]
    fn chat_completions_url_standard_openai() {
        let p = make_provider("openai", "https://api.openai.com/v1", None);
        assert_eq!(
            p.chat_completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn chat_completions_url_custom_full_endpoint() {
        let p = make_provider(
            "custom",
            "https://my-api.example.com/v2/llm/chat/completions",
            None,
        );
        assert_eq!(
            p.chat_completions_url(),
            "https://my-api.example.com/v2/llm/chat/completions"
        );
    }

    #[test]
    fn chat_completions_url_requires_exact_suffix_match() {
        let p = make_provider(
            "custom",
            "https://my-api.example.com/v2/llm/chat/completions-proxy",
            None,
        );
        assert_eq!(
            p.chat_completions_url(),
            "https://my-api.example.com/v2/llm/chat/completions-proxy/chat/completions"
        );
    }
}
