//! Tool subsystem for agent-callable capabilities.
//!
//! Each tool implements the [`Tool`] trait defined in [`traits`]: a name, a
//! description, a JSON parameter schema and an async `execute` returning a
//! [`ToolResult`]. [`tools_for`] assembles the tool list each domain agent is
//! allowed to call.
//!
//! # Extension
//!
//! To add a tool, implement [`Tool`] in a new submodule and return it from
//! [`tools_for`] for the categories that should see it.

pub mod compare;
pub mod prompt_tool;
pub mod traits;

pub use compare::{ProductCatalog, ProductComparatorTool};
pub use prompt_tool::PromptTool;
pub use traits::Tool;
#[allow(unused_imports)]
pub use traits::{ToolResult, ToolSpec};

use crate::agent::Category;
use crate::providers::Provider;
use std::path::PathBuf;
use std::sync::Arc;

const SUMMARIZE_NOTES_TEMPLATE: &str = "You are a knowledgeable and concise academic assistant.\n\
Summarize the following academic notes. Keep key concepts, facts and technical terms intact \
and do not add information.\n\n--- Notes ---\n{text}\n-------------\n\nSummary:";

const GENERAL_QUERY_TEMPLATE: &str = "You are a helpful general handler. Answer the query below \
with a clear, step-by-step explanation that anyone can follow.\n\n--- Query ---\n{query}\n\
-------------\n\nResponse:";

/// Everything a tool needs from the composition root.
#[derive(Clone)]
pub struct ToolContext {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f64,
    pub product_catalog_path: PathBuf,
}

/// Tools available to the agent handling `category`.
pub fn tools_for(category: Category, ctx: &ToolContext) -> Vec<Box<dyn Tool>> {
    match category {
        Category::Academic => vec![Box::new(PromptTool::new(
            "summarize_notes",
            "Summarizes lecture or study notes.",
            "text",
            "Lecture or academic notes to summarize",
            SUMMARIZE_NOTES_TEMPLATE,
            ctx.provider.clone(),
            &ctx.model,
            ctx.temperature,
        ))],
        Category::News => vec![],
        Category::Shopping => vec![Box::new(ProductComparatorTool::new(
            ctx.product_catalog_path.clone(),
            ctx.provider.clone(),
            &ctx.model,
            ctx.temperature,
        ))],
        Category::General => vec![Box::new(PromptTool::new(
            "handle_general_query",
            "Handles general user queries or open-ended tasks.",
            "query",
            "The general query or task to be processed.",
            GENERAL_QUERY_TEMPLATE,
            ctx.provider.clone(),
            &ctx.model,
            ctx.temperature,
        ))],
    }
}
