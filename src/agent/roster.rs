use super::domain::DomainAgent;
use super::loop_::LoopLimits;
use super::traits::{Agent, Category};
use crate::tools::ToolContext;
use std::collections::HashMap;
use std::sync::Arc;

/// One agent per [`Category`]. Complete by construction.
#[derive(Clone)]
pub struct AgentRoster {
    agents: HashMap<Category, Arc<dyn Agent>>,
}

impl AgentRoster {
    /// Standard roster: a [`DomainAgent`] per category sharing one provider.
    pub fn from_provider(ctx: &ToolContext, limits: LoopLimits) -> Self {
        let agents = Category::ALL
            .into_iter()
            .map(|category| {
                let agent: Arc<dyn Agent> =
                    Arc::new(DomainAgent::for_category(category, ctx, limits));
                (category, agent)
            })
            .collect();
        Self { agents }
    }

    /// Custom roster. Fails unless every category has an agent.
    pub fn from_agents(
        agents: impl IntoIterator<Item = (Category, Arc<dyn Agent>)>,
    ) -> anyhow::Result<Self> {
        let agents: HashMap<Category, Arc<dyn Agent>> = agents.into_iter().collect();
        let missing: Vec<&str> = Category::ALL
            .iter()
            .filter(|c| !agents.contains_key(*c))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("agent roster is missing: {}", missing.join(", "));
        }
        Ok(Self { agents })
    }

    pub fn get(&self, category: Category) -> Arc<dyn Agent> {
        // Both constructors guarantee every category is present.
        self.agents[&category].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::scripted::ScriptedProvider;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct Fixed(Category);

    #[async_trait]
    impl Agent for Fixed {
        async fn run(&self, _query: &str) -> String {
            format!("{} answer", self.0)
        }
        fn category(&self) -> Category {
            self.0
        }
    }

    #[test]
    fn from_provider_covers_every_category() {
        let ctx = ToolContext {
            provider: Arc::new(ScriptedProvider::new()),
            model: "m".into(),
            temperature: 0.7,
            product_catalog_path: PathBuf::new(),
        };
        let roster = AgentRoster::from_provider(&ctx, LoopLimits::default());
        for category in Category::ALL {
            assert_eq!(roster.get(category).category(), category);
        }
    }

    #[test]
    fn from_agents_rejects_incomplete_roster() {
        let err = AgentRoster::from_agents([
            (Category::Academic, Arc::new(Fixed(Category::Academic)) as Arc<dyn Agent>),
            (Category::News, Arc::new(Fixed(Category::News)) as Arc<dyn Agent>),
        ])
        .err()
        .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("shopping"));
        assert!(msg.contains("general"));
    }

    #[tokio::test]
    async fn from_agents_dispatches_by_category() {
        let roster = AgentRoster::from_agents(
            Category::ALL.map(|c| (c, Arc::new(Fixed(c)) as Arc<dyn Agent>)),
        )
        .unwrap();
        assert_eq!(roster.get(Category::News).run("q").await, "news answer");
    }
}
