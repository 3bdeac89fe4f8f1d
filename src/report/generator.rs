//! Markdown and JSON report generation.
//!
//! This module renders one cycle update, together with whatever the
//! presentation layer attached to it (new-item flags, verification
//! results, the rolling ticker), into a report file.

use crate::analysis::{count_by_level, fingerprint, source_distribution, sort_by_severity};
use crate::models::{
    Agent, Analysis, BreakingEntry, CycleUpdate, IntelItem, SeverityLevel, VerificationResult,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Summary figures shown at the top of a report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    pub total_items: usize,
    pub critical_items: usize,
    pub new_items: usize,
    pub agents_reporting: usize,
    pub agents_total: usize,
}

/// A verified item and its verdict; `None` when no model answered.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedItem {
    pub agent_id: String,
    pub headline: String,
    pub severity: u8,
    pub result: Option<VerificationResult>,
}

/// Everything one report file is built from.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub metadata: ReportMetadata,
    pub update: CycleUpdate,
    /// Fingerprints of items absent from the previous cycle.
    pub new_fingerprints: HashSet<String>,
    pub verifications: Vec<VerifiedItem>,
    /// Rolling ticker, newest first.
    pub ticker: Vec<BreakingEntry>,
    #[serde(skip)]
    pub agents: Vec<Agent>,
}

impl CycleReport {
    pub fn new(
        update: CycleUpdate,
        agents: &[Agent],
        new_fingerprints: HashSet<String>,
        verifications: Vec<VerifiedItem>,
        ticker: Vec<BreakingEntry>,
    ) -> Self {
        let metadata = ReportMetadata {
            cycle: update.cycle,
            generated_at: update.timestamp,
            total_items: update.total_items(),
            critical_items: update.critical_items(),
            new_items: new_fingerprints.len(),
            agents_reporting: update.intel.values().filter(|v| !v.is_empty()).count(),
            agents_total: agents.len(),
        };

        Self {
            metadata,
            update,
            new_fingerprints,
            verifications,
            ticker,
            agents: agents.to_vec(),
        }
    }

    fn is_new(&self, item: &IntelItem) -> bool {
        self.new_fingerprints.contains(&fingerprint(&item.headline))
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &CycleReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Intel Report - Cycle #{}\n\n", report.metadata.cycle));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(report));

    if let Some(ref analysis) = report.update.analysis {
        output.push_str(&generate_assessment_section(analysis));
    }

    output.push_str(&generate_ticker_section(&report.ticker));
    output.push_str(&generate_intel_section(report));
    output.push_str(&generate_verification_section(&report.verifications));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Cycle:** {}\n", metadata.cycle));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Agents Reporting:** {}/{}\n",
        metadata.agents_reporting, metadata.agents_total
    ));
    section.push_str(&format!("- **Total Reports:** {}\n", metadata.total_items));
    section.push_str(&format!("- **Critical (S4+):** {}\n", metadata.critical_items));
    if metadata.new_items > 0 {
        section.push_str(&format!("- **New Since Last Cycle:** {}\n", metadata.new_items));
    }
    section.push('\n');

    section
}

fn generate_summary_section(report: &CycleReport) -> String {
    let intel = &report.update.intel;
    if report.metadata.total_items == 0 {
        return "## Summary\n\nNo reports were collected this cycle.\n\n".to_string();
    }

    let mut section = String::new();
    section.push_str("## Summary\n\n");

    let counts = count_by_level(intel);
    let count = |level: SeverityLevel| counts.get(&level).copied().unwrap_or(0);
    section.push_str(&format!(
        "| {} Critical | {} High | {} Medium | {} Low | **Total** |\n",
        SeverityLevel::Critical.emoji(),
        SeverityLevel::High.emoji(),
        SeverityLevel::Medium.emoji(),
        SeverityLevel::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | **{}** |\n\n",
        count(SeverityLevel::Critical),
        count(SeverityLevel::High),
        count(SeverityLevel::Medium),
        count(SeverityLevel::Low),
        report.metadata.total_items
    ));

    let sources = source_distribution(intel);
    if !sources.is_empty() {
        section.push_str("### Most Cited Sources\n\n");
        section.push_str("| Source | Reports |\n");
        section.push_str("|:---|:---:|\n");
        for (source, n) in sources.iter().take(5) {
            section.push_str(&format!("| {} | {} |\n", table_cell(source), n));
        }
        section.push('\n');
    }

    section
}

fn push_prose(section: &mut String, title: &str, text: &Option<String>) {
    if let Some(text) = text {
        section.push_str(&format!("**{}:** {}\n\n", title, text));
    }
}

fn push_list(section: &mut String, title: &str, items: &Option<Vec<String>>, numbered: bool) {
    let Some(items) = items else {
        return;
    };
    if items.is_empty() {
        return;
    }
    section.push_str(&format!("### {}\n\n", title));
    for (i, item) in items.iter().enumerate() {
        if numbered {
            section.push_str(&format!("{}. {}\n", i + 1, item));
        } else {
            section.push_str(&format!("- {}\n", item));
        }
    }
    section.push('\n');
}

fn generate_assessment_section(analysis: &Analysis) -> String {
    let mut section = String::new();

    section.push_str("## Situation Assessment\n\n");

    match (analysis.threat_level, &analysis.threat_label) {
        (Some(level), Some(label)) => {
            section.push_str(&format!("**Threat Level:** {}/10 ({})\n\n", level, label))
        }
        (Some(level), None) => section.push_str(&format!("**Threat Level:** {}/10\n\n", level)),
        (None, Some(label)) => section.push_str(&format!("**Threat Level:** {}\n\n", label)),
        (None, None) => {}
    }

    if analysis.escalation_probability.is_some() || analysis.nuclear_risk.is_some() {
        section.push_str("| Escalation Probability | Nuclear Risk |\n");
        section.push_str("|:---:|:---:|\n");
        let pct = |v: Option<u8>| v.map_or_else(|| "-".to_string(), |p| format!("{}%", p));
        section.push_str(&format!(
            "| {} | {} |\n\n",
            pct(analysis.escalation_probability),
            pct(analysis.nuclear_risk)
        ));
    }

    if let Some(ref summary) = analysis.situation_summary {
        section.push_str(summary);
        section.push_str("\n\n");
    }

    push_list(&mut section, "Last 24 Hours", &analysis.timeline_last_24h, false);
    push_prose(&mut section, "Next Hours", &analysis.next_hours_prediction);
    push_prose(&mut section, "Next Days", &analysis.next_days_prediction);
    push_list(&mut section, "Key Risks", &analysis.key_risks, true);
    push_prose(&mut section, "Oil Impact", &analysis.oil_impact);
    push_prose(&mut section, "Proxy Forces", &analysis.proxy_status);
    push_prose(&mut section, "Diplomacy", &analysis.diplomatic_status);
    push_prose(&mut section, "Civilian Impact", &analysis.civilian_impact);
    push_list(&mut section, "Breaking Alerts", &analysis.breaking_alerts, false);

    if let Some(ref recommendation) = analysis.recommendation {
        section.push_str(&format!("> 💡 **Recommendation:** {}\n\n", recommendation));
    }

    section
}

fn generate_ticker_section(ticker: &[BreakingEntry]) -> String {
    if ticker.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Breaking\n\n");
    for entry in ticker {
        let level = SeverityLevel::from_score(entry.severity);
        if entry.time.is_empty() {
            section.push_str(&format!("- {} {}\n", level.emoji(), entry.text));
        } else {
            section.push_str(&format!(
                "- {} {} *({})*\n",
                level.emoji(),
                entry.text,
                entry.time
            ));
        }
    }
    section.push('\n');

    section
}

fn generate_intel_section(report: &CycleReport) -> String {
    let mut section = String::new();
    section.push_str("## Intel by Agent\n\n");

    // Configured agents first, in their configured order, then any stray ids.
    let mut order: Vec<(String, String, String)> = report
        .agents
        .iter()
        .map(|a| (a.id.clone(), a.label(), a.description.clone()))
        .collect();
    for id in report.update.intel.keys() {
        if !order.iter().any(|(known, _, _)| known == id) {
            order.push((id.clone(), id.to_uppercase(), String::new()));
        }
    }

    for (id, label, description) in order {
        let Some(items) = report.update.intel.get(&id) else {
            continue;
        };

        section.push_str(&format!("### {} ({})\n\n", label, items.len()));
        if !description.is_empty() {
            section.push_str(&format!("*{}*\n\n", description));
        }
        if items.is_empty() {
            section.push_str("*No reports this cycle.*\n\n");
            continue;
        }

        let mut items = items.clone();
        sort_by_severity(&mut items);
        for item in &items {
            section.push_str(&generate_item_block(item, report.is_new(item)));
        }
    }

    section
}

fn generate_item_block(item: &IntelItem, is_new: bool) -> String {
    let mut block = String::new();

    let level = item.level();
    let new_badge = if is_new { " 🆕 **NEW**" } else { "" };
    block.push_str(&format!(
        "#### {} **S{} {}** {}{}\n\n",
        level.emoji(),
        item.severity,
        level.to_string().to_uppercase(),
        item.headline,
        new_badge
    ));

    if !item.summary.is_empty() {
        block.push_str(&format!("{}\n\n", item.summary));
    }

    let mut facts = Vec::new();
    if !item.source.is_empty() {
        facts.push(format!("Source: {}", item.source));
    }
    if !item.time.is_empty() {
        facts.push(item.time.clone());
    }
    if let Some(ref location) = item.location {
        facts.push(format!("📍 {}", location));
    }
    if item.verified {
        facts.push("✔ source-verified".to_string());
    }
    facts.push(format!("via `{}`", item.model));
    block.push_str(&format!("*{}*\n\n", facts.join(" | ")));

    block
}

fn generate_verification_section(verifications: &[VerifiedItem]) -> String {
    if verifications.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Cross-Verification\n\n");
    section.push_str("| Report | Verdict | Confidence | Consensus | Models |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");

    for v in verifications {
        match v.result {
            Some(ref r) => {
                let verdict = if r.verified { "✅ Verified" } else { "❌ Unverified" };
                section.push_str(&format!(
                    "| [S{}] {} | {} | {}% | {} | {}/{}/{} |\n",
                    v.severity,
                    table_cell(&v.headline),
                    verdict,
                    r.confidence,
                    r.cross_verification.consensus,
                    r.cross_verification.models_confirmed,
                    r.cross_verification.models_responded,
                    r.cross_verification.models_queried
                ));
            }
            None => section.push_str(&format!(
                "| [S{}] {} | ⚪ No answer | - | - | - |\n",
                v.severity,
                table_cell(&v.headline)
            )),
        }
    }
    section.push_str("\n*Models: confirmed/responded/queried.*\n\n");

    for v in verifications {
        let Some(ref r) = v.result else {
            continue;
        };
        if r.corroborating_sources.is_empty() && r.notes.is_none() {
            continue;
        }
        section.push_str(&format!("**{}**\n\n", v.headline));
        if !r.corroborating_sources.is_empty() {
            section.push_str(&format!(
                "- Corroborated by: {}\n",
                r.corroborating_sources.join(", ")
            ));
        }
        if let Some(ref notes) = r.notes {
            section.push_str(&format!("- Notes: {}\n", notes));
        }
        section.push('\n');
    }

    section
}

/// Model text made safe for a single Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn generate_footer() -> String {
    "---\n\n*Generated by Intelwatch. Model output is unverified unless stated otherwise.*\n"
        .to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &CycleReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
