use super::traits::Category;

pub const CLASSIFICATION_PROMPT: &str = "You are a helpful routing assistant. Your job is to \
classify user queries into one of the following agent categories:

- academic: for educational, lecture notes, or video summary related questions.
- news: for current events, news summaries, or trending topics.
- shopping: for product recommendations or comparisons.
- general: for all other general-purpose queries.

Only respond with one of: academic, news, shopping, general.";

/// System prompt for the agent handling `category`.
pub fn system_prompt(category: Category) -> &'static str {
    match category {
        Category::Academic => {
            "You are an academic assistant. Help with lecture notes, study material and \
             educational questions. Use the summarize_notes tool when the user supplies notes \
             to condense."
        }
        Category::News => {
            "You are a news assistant. Summarize current events and trending topics clearly \
             and note when your knowledge may be out of date."
        }
        Category::Shopping => {
            "You are a shopping assistant. Help with product recommendations and comparisons. \
             When the user compares two products, call compare_products with a query of the \
             form 'Product A vs Product B'."
        }
        Category::General => "You are a helpful general assistant.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prompt_lists_every_category() {
        for category in Category::ALL {
            assert!(CLASSIFICATION_PROMPT.contains(category.as_str()));
        }
    }

    #[test]
    fn every_category_has_a_system_prompt() {
        for category in Category::ALL {
            assert!(!system_prompt(category).trim().is_empty());
        }
    }
}
