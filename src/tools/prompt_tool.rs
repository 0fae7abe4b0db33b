//! Single-argument tool that answers by filling a prompt template and asking
//! the shared provider.

use super::traits::{Tool, ToolResult};
use crate::providers::Provider;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct PromptTool {
    name: &'static str,
    description: &'static str,
    argument: &'static str,
    argument_description: &'static str,
    template: &'static str,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl PromptTool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        description: &'static str,
        argument: &'static str,
        argument_description: &'static str,
        template: &'static str,
        provider: Arc<dyn Provider>,
        model: &str,
        temperature: f64,
    ) -> Self {
        Self {
            name,
            description,
            argument,
            argument_description,
            template,
            provider,
            model: model.to_string(),
            temperature,
        }
    }

    /// Substitute `{<argument>}` in the template.
    fn render(&self, value: &str) -> String {
        self.template
            .replace(&format!("{{{}}}", self.argument), value)
    }
}

#[async_trait]
impl Tool for PromptTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                self.argument: {
                    "type": "string",
                    "description": self.argument_description,
                }
            },
            "required": [self.argument],
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let Some(value) = args
            .get(self.argument)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(ToolResult::failed(format!(
                "missing required string argument '{}'",
                self.argument
            )));
        };

        let prompt = self.render(value);
        let output = self
            .provider
            .chat_with_system(None, &prompt, &self.model, self.temperature)
            .await?;
        Ok(ToolResult::ok(output.trim()))
    }
}
