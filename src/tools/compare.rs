//! `compare_products`: looks up two products in a local JSON catalog and asks
//! the provider for a side-by-side comparison.

use super::traits::{Tool, ToolResult};
use crate::providers::Provider;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const INVALID_FORMAT: &str = "Invalid format. Use 'Product A vs Product B'.";
const NOT_FOUND: &str = "One or both products not found in the database.";

const COMPARE_TEMPLATE: &str = "You are a product comparison expert.\n\n\
Compare the following two products in terms of features, pricing, and value:\n\n\
Product 1:\n{product1}\n\nProduct 2:\n{product2}\n\n\
Generate a clear, side-by-side comparison and conclude which is better and why.";

/// Product records loaded from a JSON array of objects, each with a `name`.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Value>,
}

impl ProductCatalog {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let products: Vec<Value> =
            serde_json::from_str(raw).context("product catalog must be a JSON array")?;
        Ok(Self { products })
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read product catalog: {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// First product whose name contains `needle`, case-insensitively.
    pub fn find(&self, needle: &str) -> Option<&Value> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.products.iter().find(|p| {
            p.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
    }
}

/// Split `"A vs B"` into its two halves. Anything else is rejected.
pub fn split_versus(query: &str) -> Option<(&str, &str)> {
    let (left, right) = query.split_once(" vs ")?;
    if right.contains(" vs ") {
        return None;
    }
    Some((left.trim(), right.trim()))
}

pub struct ProductComparatorTool {
    catalog_path: PathBuf,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl ProductComparatorTool {
    pub fn new(
        catalog_path: PathBuf,
        provider: Arc<dyn Provider>,
        model: &str,
        temperature: f64,
    ) -> Self {
        Self {
            catalog_path,
            provider,
            model: model.to_string(),
            temperature,
        }
    }
}

#[async_trait]
impl Tool for ProductComparatorTool {
    fn name(&self) -> &str {
        "compare_products"
    }

    fn description(&self) -> &str {
        "Compares two products. Use format: 'Product A vs Product B'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Format: 'Product A vs Product B'"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let query = args.get("query").and_then(Value::as_str).unwrap_or("");
        let Some((left, right)) = split_versus(query) else {
            return Ok(ToolResult::ok(INVALID_FORMAT));
        };

        // Re-read on every call so catalog edits apply without a restart.
        let catalog = ProductCatalog::load(&self.catalog_path).await?;
        let (Some(first), Some(second)) = (catalog.find(left), catalog.find(right)) else {
            return Ok(ToolResult::ok(NOT_FOUND));
        };

        let prompt = COMPARE_TEMPLATE
            .replace("{product1}", &first.to_string())
            .replace("{product2}", &second.to_string());
        let comparison = self
            .provider
            .chat_with_system(None, &prompt, &self.model, self.temperature)
            .await?;
        Ok(ToolResult::ok(comparison.trim()))
    }
}
