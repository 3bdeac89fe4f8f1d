//! Agent query unit.
//!
//! One agent, one pass: build the collection prompt, call the gateway,
//! parse the reply and normalize every item.

use super::parser::extract_array;
use super::Briefing;
use crate::analysis::dedupe;
use crate::gateway::{GatewayError, ModelGateway, Prompt};
use crate::models::{Agent, IntelItem};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How an agent's query templates become gateway calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStrategy {
    /// All templates OR-ed into one prompt.
    #[default]
    Combined,
    /// One concurrent call per template, merged afterwards.
    PerTemplate,
}

/// Build the collection prompt for a set of query templates.
pub fn build_collection_prompt(agent: &Agent, queries: &[String], briefing: &Briefing) -> String {
    let all_queries = queries.join(" OR ");
    let source_mentions = agent
        .sources
        .iter()
        .map(|s| format!("@{}", s))
        .collect::<Vec<_>>()
        .join(", ");
    let news = briefing
        .news_sources
        .iter()
        .take(4)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Search for the very latest breaking news about: \"{}\".\n",
        all_queries
    ));
    prompt.push_str(&format!("Topic: {}.\n", briefing.topic));
    prompt.push_str(&briefing.date_line());
    prompt.push_str("Focus on the most recent updates.\n");
    if !source_mentions.is_empty() {
        prompt.push_str(&format!("Credible OSINT sources: {}.", source_mentions));
    }
    if !news.is_empty() {
        prompt.push_str(&format!(" Also check: {}", news));
    }
    prompt.push_str("\n\n");
    prompt.push_str(&format!(
        "Return ONLY a valid JSON array of {} most important recent updates, written in {}.\n",
        briefing.items_per_query, briefing.language
    ));
    prompt.push_str(r#"Each item: {"headline":"<title>","summary":"<2-3 sentences>","source":"<outlet>","time":"<e.g. 2 hours ago>","severity":<1-5>,"verified":<boolean>,"location":"<place>"}"#);
    prompt.push_str("\nONLY the JSON array. No markdown.");
    prompt
}

/// Everything a collection pass shares across agents.
pub struct Collector<'a> {
    pub gateway: &'a dyn ModelGateway,
    pub api_key: &'a str,
    pub briefing: &'a Briefing,
    pub strategy: QueryStrategy,
}

impl<'a> Collector<'a> {
    /// Collect one agent's items.
    ///
    /// Unparseable replies yield an empty list; only gateway failures are
    /// errors. The result never holds two items with the same fingerprint.
    pub async fn collect(&self, agent: &Agent) -> Result<Vec<IntelItem>, GatewayError> {
        if agent.queries.is_empty() {
            warn!("Agent {} has no query templates", agent.id);
            return Ok(vec![]);
        }

        let items = match self.strategy {
            QueryStrategy::Combined => self.query(agent, &agent.queries).await?,
            QueryStrategy::PerTemplate => {
                let outcomes = join_all(
                    agent
                        .queries
                        .iter()
                        .map(|q| self.query(agent, std::slice::from_ref(q))),
                )
                .await;

                let mut items = Vec::new();
                let mut first_error = None;
                let mut any_ok = false;
                for outcome in outcomes {
                    match outcome {
                        Ok(batch) => {
                            any_ok = true;
                            items.extend(batch);
                        }
                        Err(e) => {
                            debug!("Template query for {} failed: {}", agent.id, e);
                            first_error.get_or_insert(e);
                        }
                    }
                }

                match first_error {
                    Some(e) if !any_ok => return Err(e),
                    _ => items,
                }
            }
        };

        Ok(dedupe(items))
    }

    async fn query(&self, agent: &Agent, queries: &[String]) -> Result<Vec<IntelItem>, GatewayError> {
        let prompt = Prompt::new(
            build_collection_prompt(agent, queries, self.briefing),
            self.briefing.tokens.collection,
        )
        .with_model(agent.model.as_deref());

        let completion = self.gateway.invoke(self.api_key, &prompt).await?;
        let fetched_at = Utc::now().timestamp_millis();

        let Some(values) = extract_array(&completion.text) else {
            warn!(
                "Agent {}: reply from {} held no JSON array",
                agent.id, completion.model
            );
            return Ok(vec![]);
        };

        Ok(values
            .iter()
            .filter_map(|v| IntelItem::from_value(v, agent, &completion.model, fetched_at))
            .collect())
    }
}
