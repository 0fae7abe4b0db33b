use super::prompt::CLASSIFICATION_PROMPT;
use super::traits::{Category, QueryClassifier};
use crate::providers::Provider;
use async_trait::async_trait;
use std::sync::Arc;

/// Asks the provider to label the query. One attempt, no retries.
pub struct LlmClassifier {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: &str, temperature: f64) -> Self {
        Self {
            provider,
            model: model.to_string(),
            temperature,
        }
    }
}

/// Map a raw model reply onto a category, `None` when it is not one of the labels.
pub fn parse_label(reply: &str) -> Option<Category> {
    reply.parse().ok()
}

#[async_trait]
impl QueryClassifier for LlmClassifier {
    async fn classify(&self, query: &str) -> Category {
        let reply = match self
            .provider
            .chat_with_system(Some(CLASSIFICATION_PROMPT), query, &self.model, self.temperature)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error during classification: {e}");
                return Category::General;
            }
        };

        match parse_label(&reply) {
            Some(category) => {
                tracing::info!(category = %category, "Classified query");
                category
            }
            None => {
                tracing::warn!(
                    "Unrecognized category: '{}', defaulting to 'general'",
                    reply.trim()
                );
                Category::General
            }
        }
    }

    fn name(&self) -> &str {
        "llm"
    }
}
