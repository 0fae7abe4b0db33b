//! Provider subsystem for model inference backends.
//!
//! Each provider implements the [`Provider`] trait defined in [`traits`] and is
//! registered in [`create_provider_with_url`] by its canonical string key. One
//! provider instance is built at startup and shared (`Arc<dyn Provider>`) by the
//! classifier, every agent, and every LLM-backed tool.

pub mod compatible;
pub mod gemini;
#[cfg(test)]
pub(crate) mod scripted;
pub mod traits;

#[allow(unused_imports)]
pub use traits::{
    ChatMessage, ChatRequest, ChatResponse, ConversationMessage, Provider, ToolCall,
    ToolResultMessage,
};

use compatible::OpenAiCompatibleProvider;
use gemini::GeminiProvider;

const MAX_API_ERROR_CHARS: usize = 200;

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts `sk-` (OpenAI/OpenRouter), `AIza` (Google) and `ghp_` tokens, plus
/// anything passed as a `key=` query parameter.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 4] = ["sk-", "AIza", "key=", "ghp_"];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Resolve API key for a provider from config and environment variables.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(raw_override) = credential_override {
        let trimmed_override = raw_override.trim();
        if !trimmed_override.is_empty() {
            return Some(trimmed_override.to_owned());
        }
    }

    let provider_env_candidates: Vec<&str> = match name {
        "gemini" | "google" => vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        "openai" => vec!["OPENAI_API_KEY"],
        "openrouter" => vec!["OPENROUTER_API_KEY"],
        _ => vec![],
    };

    for env_var in provider_env_candidates
        .into_iter()
        .chain(["ROUTEBOT_API_KEY", "API_KEY"])
    {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Factory: create the right provider from config with optional custom base URL
pub fn create_provider_with_url(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let canonical = name.trim().to_ascii_lowercase();
    let resolved_credential = resolve_provider_credential(&canonical, api_key);
    let key = resolved_credential.as_deref();

    if let Some(url) = name.trim().strip_prefix("custom:") {
        if url.trim().is_empty() {
            anyhow::bail!("custom provider requires a URL, e.g. custom:https://host/v1");
        }
        return Ok(Box::new(OpenAiCompatibleProvider::new(
            "custom",
            url.trim(),
            key,
        )));
    }

    match canonical.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiProvider::new(api_url, key))),
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "openai",
            api_url.unwrap_or("https://api.openai.com/v1"),
            key,
        ))),
        "openrouter" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "openrouter",
            api_url.unwrap_or("https://openrouter.ai/api/v1"),
            key,
        ))),
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported: gemini, openai, openrouter, custom:<URL>."
        ),
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"gemini"`)
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    /// Alternative names accepted in config
    pub aliases: &'static [&'static str],
}

/// Return the list of all known providers for display in `routebot providers`.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "gemini",
            display_name: "Google Gemini",
            aliases: &["google"],
        },
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            aliases: &[],
        },
        ProviderInfo {
            name: "openrouter",
            display_name: "OpenRouter",
            aliases: &[],
        },
    ]
}
