use super::loop_::{run_tool_loop, LoopLimits, LoopOutcome};
use super::prompt::system_prompt;
use super::traits::{Agent, Category};
use crate::providers::{sanitize_api_error, Provider};
use crate::tools::{tools_for, Tool, ToolContext};
use async_trait::async_trait;
use std::sync::Arc;

/// An agent specialised by category: its own system prompt and tool list on
/// top of the shared provider.
pub struct DomainAgent {
    category: Category,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    system_prompt: String,
    tools: Vec<Box<dyn Tool>>,
    limits: LoopLimits,
}

impl DomainAgent {
    pub fn new(
        category: Category,
        provider: Arc<dyn Provider>,
        model: &str,
        temperature: f64,
        tools: Vec<Box<dyn Tool>>,
        limits: LoopLimits,
    ) -> Self {
        Self {
            category,
            provider,
            model: model.to_string(),
            temperature,
            system_prompt: system_prompt(category).to_string(),
            tools,
            limits,
        }
    }

    /// Agent wired with the standard tools for `category`.
    pub fn for_category(category: Category, ctx: &ToolContext, limits: LoopLimits) -> Self {
        Self::new(
            category,
            ctx.provider.clone(),
            &ctx.model,
            ctx.temperature,
            tools_for(category, ctx),
            limits,
        )
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

/// Show tool outputs ahead of the final answer when any tool ran.
pub fn render_answer(outcome: &LoopOutcome) -> String {
    if outcome.tool_outputs.is_empty() {
        return outcome.text.clone();
    }
    let outputs = outcome
        .tool_outputs
        .iter()
        .map(|t| t.output.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Tool outputs:\n{outputs}\n\nFinal answer:\n{}", outcome.text)
}

#[async_trait]
impl Agent for DomainAgent {
    async fn run(&self, query: &str) -> String {
        tracing::info!(agent = %self.category, "Agent handling query");
        match run_tool_loop(
            self.provider.as_ref(),
            &self.system_prompt,
            query,
            &self.tools,
            &self.model,
            self.temperature,
            self.limits,
        )
        .await
        {
            Ok(outcome) => render_answer(&outcome),
            Err(e) => {
                let detail = sanitize_api_error(&e.to_string());
                tracing::error!(agent = %self.category, "Agent failed: {detail}");
                format!("⚠️ The {} agent could not answer: {detail}", self.category)
            }
        }
    }

    fn category(&self) -> Category {
        self.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::loop_::ToolOutput;
    use crate::providers::scripted::ScriptedProvider;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn ctx(provider: Arc<ScriptedProvider>, catalog: PathBuf) -> ToolContext {
        ToolContext {
            provider,
            model: "m".into(),
            temperature: 0.7,
            product_catalog_path: catalog,
        }
    }

    #[tokio::test]
    async fn plain_answer_is_returned_verbatim() {
        let provider = Arc::new(ScriptedProvider::new().push_text("The capital of France is Paris."));
        let agent = DomainAgent::for_category(
            Category::General,
            &ctx(provider, PathBuf::new()),
            LoopLimits::default(),
        );
        assert_eq!(
            agent.run("What's the capital of France?").await,
            "The capital of France is Paris."
        );
    }

    #[tokio::test]
    async fn provider_failure_yields_degraded_answer() {
        let provider = Arc::new(ScriptedProvider::new().push_error("key=AIzaSecret123 rejected"));
        let agent = DomainAgent::for_category(
            Category::News,
            &ctx(provider, PathBuf::new()),
            LoopLimits::default(),
        );
        let answer = agent.run("headlines").await;
        assert!(answer.starts_with("⚠️ The news agent could not answer:"));
        assert!(!answer.contains("AIzaSecret123"));
    }

    #[tokio::test]
    async fn shopping_agent_uses_comparator_and_shows_tool_output() {
        let tmp = TempDir::new().unwrap();
        let catalog = tmp.path().join("product_data.json");
        std::fs::write(
            &catalog,
            r#"[{"name": "Apple iPhone 15"}, {"name": "Samsung Galaxy S23"}]"#,
        )
        .unwrap();

        let provider = Arc::new(
            ScriptedProvider::new()
                .push_tool_call("compare_products", json!({"query": "iPhone 15 vs Galaxy S23"}))
                .push_text("Both are flagship phones.")
                .push_text("Pick the Galaxy for the camera."),
        );
        let agent = DomainAgent::for_category(
            Category::Shopping,
            &ctx(provider, catalog),
            LoopLimits::default(),
        );
        assert_eq!(agent.tool_names(), vec!["compare_products"]);

        let answer = agent.run("compare iPhone 15 vs Galaxy S23").await;
        assert_eq!(
            answer,
            "Tool outputs:\nBoth are flagship phones.\n\nFinal answer:\nPick the Galaxy for the camera."
        );
    }

    #[test]
    fn render_answer_without_tools_is_just_text() {
        let outcome = LoopOutcome {
            text: "hi".into(),
            tool_outputs: vec![],
            iterations: 1,
            hit_iteration_cap: false,
        };
        assert_eq!(render_answer(&outcome), "hi");

        let outcome = LoopOutcome {
            tool_outputs: vec![ToolOutput {
                tool: "t".into(),
                output: " out \n".into(),
            }],
            ..outcome
        };
        assert_eq!(render_answer(&outcome), "Tool outputs:\nout\n\nFinal answer:\nhi");
    }
}
