//! Situation assessment and breaking-news ticker.

use super::aggregator::top_items;
use crate::agent::{extract_array, extract_json, Briefing};
use crate::gateway::{GatewayError, ModelGateway, Prompt};
use crate::models::{Agent, Analysis, BreakingEntry, IntelMap};
use tracing::{debug, warn};

/// Items per agent fed into the assessment prompt.
pub const ITEMS_PER_AGENT: usize = 4;

/// Ticker headlines requested per fetch.
pub const BREAKING_ITEMS: usize = 6;

/// Build the assessment prompt, or `None` when no agent has items.
pub fn build_analysis_prompt(intel: &IntelMap, agents: &[Agent], briefing: &Briefing) -> Option<String> {
    // Configured order first, then ids no agent claims.
    let mut order: Vec<(&str, String)> = agents.iter().map(|a| (a.id.as_str(), a.label())).collect();
    for id in intel.keys() {
        if !agents.iter().any(|a| &a.id == id) {
            order.push((id.as_str(), id.clone()));
        }
    }

    let sections: Vec<String> = order
        .into_iter()
        .filter_map(|(id, label)| {
            let items = intel.get(id).filter(|items| !items.is_empty())?;
            let bullets = top_items(items, ITEMS_PER_AGENT)
                .iter()
                .map(|i| format!("  - [S{}] {}: {}", i.severity, i.headline, i.summary))
                .collect::<Vec<_>>()
                .join("\n");
            Some(format!("{}:\n{}", label, bullets))
        })
        .collect();

    if sections.is_empty() {
        return None;
    }

    let total: usize = intel.values().map(Vec::len).sum();
    let critical = intel.values().flatten().filter(|i| i.is_critical()).count();
    let lang = &briefing.language;

    let mut prompt = String::new();
    prompt.push_str("You are an elite military intelligence analyst.\n");
    prompt.push_str(&briefing.date_line());
    prompt.push_str(&format!(
        "Based on these {} reports ({} critical) about the {}:\n\n",
        total, critical, briefing.topic
    ));
    prompt.push_str(&sections.join("\n\n"));
    prompt.push_str("\n\nReturn ONLY valid JSON (no markdown):\n");
    prompt.push_str(&format!(
        r#"{{"threat_level":<1-10>,"threat_label":"<DEFCON label>","situation_summary":"<3 sentences in {lang}>","timeline_last_24h":["<4 events in {lang}>"],"next_hours_prediction":"<3 sentences {lang}>","next_days_prediction":"<3 sentences {lang}>","key_risks":["<5 risks {lang}>"],"escalation_probability":<0-100>,"nuclear_risk":<0-100>,"oil_impact":"<2 sentences {lang}>","proxy_status":"<2 sentences {lang}>","diplomatic_status":"<2 sentences {lang}>","civilian_impact":"<2 sentences {lang}>","breaking_alerts":["<3 breaking headlines {lang}>"],"recommendation":"<2 sentences {lang}>"}}"#
    ));
    Some(prompt)
}

/// Ask the synthesis model for a structured assessment.
///
/// Returns `Ok(None)` without calling the gateway when every agent came
/// back empty, and also when the reply is not a JSON object.
pub async fn synthesize(
    gateway: &dyn ModelGateway,
    api_key: &str,
    intel: &IntelMap,
    agents: &[Agent],
    briefing: &Briefing,
    model: &str,
) -> Result<Option<Analysis>, GatewayError> {
    let Some(text) = build_analysis_prompt(intel, agents, briefing) else {
        debug!("No intel to analyze, skipping synthesis");
        return Ok(None);
    };

    let prompt = Prompt::new(text, briefing.tokens.analysis).with_model(Some(model));
    let completion = gateway.invoke(api_key, &prompt).await?;

    let analysis = extract_json(&completion.text).and_then(|v| Analysis::from_value(&v));
    if analysis.is_none() {
        warn!("Assessment from {} did not parse", completion.model);
    }
    Ok(analysis)
}

pub fn build_breaking_prompt(briefing: &Briefing) -> String {
    let news = briefing.news_sources.join(", ");
    let mut prompt = format!(
        "Search for the absolute latest breaking news about the {}.\n",
        briefing.topic
    );
    prompt.push_str(&briefing.date_line());
    if !news.is_empty() {
        prompt.push_str(&format!("Check {}.\n", news));
    }
    prompt.push_str(&format!(
        r#"Return ONLY JSON array: [{{"text":"<headline in {} max 20 words>","severity":<1-5>,"time":"<when>"}}] ({} items)"#,
        briefing.language, BREAKING_ITEMS
    ));
    prompt
}

/// Fetch ticker headlines; anything but a JSON array yields none.
pub async fn fetch_breaking(
    gateway: &dyn ModelGateway,
    api_key: &str,
    briefing: &Briefing,
) -> Result<Vec<BreakingEntry>, GatewayError> {
    let prompt = Prompt::new(build_breaking_prompt(briefing), briefing.tokens.breaking);
    let completion = gateway.invoke(api_key, &prompt).await?;

    Ok(extract_array(&completion.text)
        .unwrap_or_default()
        .iter()
        .filter_map(BreakingEntry::from_value)
        .collect())
}
