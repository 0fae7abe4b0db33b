//! Agent and classifier traits plus the closed set of routing categories.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The domains a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Academic,
    News,
    Shopping,
    General,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Academic,
        Category::News,
        Category::Shopping,
        Category::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Academic => "academic",
            Category::News => "news",
            Category::Shopping => "shopping",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Accepts a label with surrounding whitespace and any casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "academic" => Ok(Category::Academic),
            "news" => Ok(Category::News),
            "shopping" => Ok(Category::Shopping),
            "general" => Ok(Category::General),
            other => anyhow::bail!("unknown category: '{other}'"),
        }
    }
}

/// A domain handler. Never fails: errors are folded into the returned text.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer a query.
    async fn run(&self, query: &str) -> String;

    fn category(&self) -> Category;
}

/// Maps a free-form query onto a [`Category`].
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    /// Classify a user query. Falls back to [`Category::General`].
    async fn classify(&self, query: &str) -> Category;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_trimmed_and_case_insensitive() {
        assert_eq!(" Academic \n".parse::<Category>().unwrap(), Category::Academic);
        assert_eq!("NEWS".parse::<Category>().unwrap(), Category::News);
        assert!("sports".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn category_display_round_trips_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&Category::Shopping).unwrap();
        assert_eq!(json, "\"shopping\"");
        let back: Category = serde_json::from_str("\"general\"").unwrap();
        assert_eq!(back, Category::General);
    }
}
