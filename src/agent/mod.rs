//! Collection agents.
//!
//! This module turns agent definitions into model prompts, runs them
//! through the gateway and normalizes what comes back.

pub mod fanout;
pub mod parser;
pub mod query;

use serde::{Deserialize, Serialize};

pub use fanout::{collect_all, FanoutPolicy};
pub use parser::{extract_array, extract_json};
pub use query::{Collector, QueryStrategy};

/// Maximum reply tokens per kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    #[serde(default = "default_collection_tokens")]
    pub collection: u32,
    #[serde(default = "default_analysis_tokens")]
    pub analysis: u32,
    #[serde(default = "default_verification_tokens")]
    pub verification: u32,
    #[serde(default = "default_breaking_tokens")]
    pub breaking: u32,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            collection: default_collection_tokens(),
            analysis: default_analysis_tokens(),
            verification: default_verification_tokens(),
            breaking: default_breaking_tokens(),
        }
    }
}

fn default_collection_tokens() -> u32 {
    1200
}

fn default_analysis_tokens() -> u32 {
    2000
}

fn default_verification_tokens() -> u32 {
    600
}

fn default_breaking_tokens() -> u32 {
    800
}

/// What every prompt needs to know about the watched topic.
#[derive(Debug, Clone)]
pub struct Briefing {
    pub topic: String,
    /// Free-text date hint, e.g. "Today is February 28, 2026."
    pub date_label: Option<String>,
    /// Language for prose in model replies.
    pub language: String,
    /// Items requested from each collection call.
    pub items_per_query: usize,
    pub news_sources: Vec<String>,
    pub tokens: TokenBudget,
}

impl Briefing {
    /// The date hint as a prompt line, or nothing.
    pub(crate) fn date_line(&self) -> String {
        match self.date_label {
            Some(ref label) if !label.trim().is_empty() => format!("{}\n", label.trim()),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_briefing() -> Briefing {
    Briefing {
        topic: "Iran-Israel-US conflict".to_string(),
        date_label: Some("Today is February 28, 2026.".to_string()),
        language: "English".to_string(),
        items_per_query: 4,
        news_sources: vec!["Reuters".to_string(), "AP".to_string()],
        tokens: TokenBudget::default(),
    }
}

#[cfg(test)]
pub(crate) fn test_agent(id: &str) -> crate::models::Agent {
    crate::models::Agent {
        id: id.to_string(),
        name: id.to_uppercase(),
        full_name: format!("{} Intelligence", id.to_uppercase()),
        icon: String::new(),
        description: String::new(),
        queries: vec![format!("{} query one", id), format!("{} query two", id)],
        sources: vec!["sentdefender".to_string()],
        model: None,
        interval_secs: 60,
    }
}
