//! Data models for the intelligence pipeline.
//!
//! This module contains the core data structures passed between the
//! collection agents, the analysis steps and the presentation layer.
//! Model output is never trusted to have a fixed shape, so the records
//! built from it are assembled field by field from `serde_json::Value`.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Severity assigned when a model omits it or sends garbage.
pub const DEFAULT_SEVERITY: u8 = 3;

/// Lowest severity counted as critical.
pub const CRITICAL_SEVERITY: u8 = 4;

/// Intel collected in one pass, keyed by agent id.
pub type IntelMap = BTreeMap<String, Vec<IntelItem>>;

/// Severity band of a 1-5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// Scores 1 and 2
    Low,
    /// Score 3
    Medium,
    /// Score 4
    High,
    /// Score 5
    Critical,
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "Low"),
            SeverityLevel::Medium => write!(f, "Medium"),
            SeverityLevel::High => write!(f, "High"),
            SeverityLevel::Critical => write!(f, "Critical"),
        }
    }
}

impl SeverityLevel {
    /// Map a normalized 1-5 score onto its band.
    pub fn from_score(score: u8) -> Self {
        match score {
            5..=u8::MAX => SeverityLevel::Critical,
            4 => SeverityLevel::High,
            3 => SeverityLevel::Medium,
            _ => SeverityLevel::Low,
        }
    }

    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            SeverityLevel::Low => "🟢",
            SeverityLevel::Medium => "🟡",
            SeverityLevel::High => "🟠",
            SeverityLevel::Critical => "🔴",
        }
    }
}

/// Read a number out of a JSON value, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Normalize a model-supplied severity into an integer in `[1, 5]`.
///
/// Missing, non-numeric and zero values fall back to [`DEFAULT_SEVERITY`].
pub fn normalize_severity(value: Option<&Value>) -> u8 {
    match value.and_then(as_number) {
        Some(n) if n != 0.0 => n.round().clamp(1.0, 5.0) as u8,
        _ => DEFAULT_SEVERITY,
    }
}

/// Clamp a number into a `[0, 100]` percentage.
pub fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(map: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    match map.get(key)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// A collection agent, defined once at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier, e.g. `sigint`.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// Long display name.
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    /// Search query templates; at least one.
    pub queries: Vec<String>,
    /// Reference source handles.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Preferred model; the gateway's fallback order applies otherwise.
    #[serde(default)]
    pub model: Option<String>,
    /// Polling interval hint in seconds.
    #[serde(default = "default_agent_interval")]
    pub interval_secs: u64,
}

fn default_agent_interval() -> u64 {
    60
}

impl Agent {
    /// Label used in prompts and reports.
    pub fn label(&self) -> String {
        let name = if self.full_name.is_empty() {
            &self.name
        } else {
            &self.full_name
        };
        if self.icon.is_empty() {
            name.clone()
        } else {
            format!("{} {}", self.icon, name)
        }
    }
}

/// Relative strength tag of a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStrength {
    Flagship,
    Strong,
    Fast,
}

/// An entry of the model registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub strength: ModelStrength,
}

/// One intelligence report produced by a collection agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelItem {
    pub headline: String,
    pub summary: String,
    pub source: String,
    /// Relative time label as given by the model, e.g. "2 hours ago".
    pub time: String,
    /// Always within `[1, 5]`.
    pub severity: u8,
    /// Model-asserted, not checked.
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub agent_id: String,
    /// Display name of the owning agent.
    pub category: String,
    /// Model that actually served the response.
    pub model: String,
    /// Collection time in Unix milliseconds.
    pub fetched_at: i64,
    /// Fields the model sent that the pipeline does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const ITEM_FIELDS: &[&str] = &[
    "headline", "summary", "source", "time", "severity", "verified", "location",
];

impl IntelItem {
    pub fn is_critical(&self) -> bool {
        self.severity >= CRITICAL_SEVERITY
    }

    /// Build an item from one element of a model's JSON array.
    ///
    /// Returns `None` for non-objects and for objects without a headline.
    pub fn from_value(value: &Value, agent: &Agent, model: &str, fetched_at: i64) -> Option<Self> {
        let map = value.as_object()?;
        let headline = string_field(map, "headline")?;

        let extra = map
            .iter()
            .filter(|(k, _)| !ITEM_FIELDS.contains(&k.as_str()))
            .filter(|(k, _)| !matches!(k.as_str(), "agent_id" | "category" | "model" | "fetched_at"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            headline,
            summary: string_field(map, "summary").unwrap_or_default(),
            source: string_field(map, "source").unwrap_or_default(),
            time: string_field(map, "time").unwrap_or_default(),
            severity: normalize_severity(map.get("severity")),
            verified: bool_field(map, "verified"),
            location: string_field(map, "location"),
            agent_id: agent.id.clone(),
            category: agent.name.clone(),
            model: model.to_string(),
            fetched_at,
            extra,
        })
    }

    pub fn level(&self) -> SeverityLevel {
        SeverityLevel::from_score(self.severity)
    }
}

/// One breaking-news ticker entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakingEntry {
    pub text: String,
    pub severity: u8,
    pub time: String,
}

impl BreakingEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            text: string_field(map, "text").or_else(|| string_field(map, "headline"))?,
            severity: normalize_severity(map.get("severity")),
            time: string_field(map, "time").unwrap_or_default(),
        })
    }
}

/// Structured situation assessment.
///
/// Every field is optional: the synthesis model is not guaranteed to fill
/// the whole shape, and a partial assessment is still worth showing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Within `[1, 10]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub situation_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_last_24h: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_hours_prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_days_prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_risks: Option<Vec<String>>,
    /// Within `[0, 100]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_probability: Option<u8>,
    /// Within `[0, 100]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nuclear_risk: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oil_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diplomatic_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civilian_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breaking_alerts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const ANALYSIS_FIELDS: &[&str] = &[
    "threat_level",
    "threat_label",
    "situation_summary",
    "timeline_last_24h",
    "next_hours_prediction",
    "next_days_prediction",
    "key_risks",
    "escalation_probability",
    "nuclear_risk",
    "oil_impact",
    "proxy_status",
    "diplomatic_status",
    "civilian_impact",
    "breaking_alerts",
    "recommendation",
];

impl Analysis {
    /// Build an assessment from whatever object the model returned.
    ///
    /// Returns `None` only when the value is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let number = |key: &str| map.get(key).and_then(as_number);

        Some(Self {
            threat_level: number("threat_level").map(|n| n.round().clamp(1.0, 10.0) as u8),
            threat_label: string_field(map, "threat_label"),
            situation_summary: string_field(map, "situation_summary"),
            timeline_last_24h: string_list(map, "timeline_last_24h"),
            next_hours_prediction: string_field(map, "next_hours_prediction"),
            next_days_prediction: string_field(map, "next_days_prediction"),
            key_risks: string_list(map, "key_risks"),
            escalation_probability: number("escalation_probability").map(clamp_percent),
            nuclear_risk: number("nuclear_risk").map(clamp_percent),
            oil_impact: string_field(map, "oil_impact"),
            proxy_status: string_field(map, "proxy_status"),
            diplomatic_status: string_field(map, "diplomatic_status"),
            civilian_impact: string_field(map, "civilian_impact"),
            breaking_alerts: string_list(map, "breaking_alerts"),
            recommendation: string_field(map, "recommendation"),
            extra: map
                .iter()
                .filter(|(k, _)| !ANALYSIS_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// One model's answer to a verification prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationVote {
    pub model: String,
    pub verified: bool,
    pub confidence: u8,
    pub sources: Vec<String>,
    pub notes: Option<String>,
}

impl VerificationVote {
    pub fn from_value(value: &Value, model: &str) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            model: model.to_string(),
            verified: bool_field(map, "verified"),
            confidence: map
                .get("confidence")
                .and_then(as_number)
                .map(clamp_percent)
                .unwrap_or(0),
            sources: string_list(map, "corroborating_sources").unwrap_or_default(),
            notes: string_field(map, "notes"),
        })
    }
}

/// Agreement among the models that answered a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consensus {
    /// Every responder confirmed.
    Unanimous,
    /// Some but not all responders confirmed.
    Partial,
    /// No responder confirmed.
    Unconfirmed,
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consensus::Unanimous => write!(f, "unanimous"),
            Consensus::Partial => write!(f, "partial"),
            Consensus::Unconfirmed => write!(f, "unconfirmed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossVerification {
    pub models_queried: usize,
    pub models_responded: usize,
    pub models_confirmed: usize,
    pub consensus: Consensus,
}

/// Majority-vote verdict on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    /// Mean responder confidence, within `[0, 100]`.
    pub confidence: u8,
    pub corroborating_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub cross_verification: CrossVerification,
}

/// The structured update emitted at the end of every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleUpdate {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub intel: IntelMap,
    pub analysis: Option<Analysis>,
    pub breaking: Vec<BreakingEntry>,
}

impl CycleUpdate {
    pub fn total_items(&self) -> usize {
        self.intel.values().map(Vec::len).sum()
    }

    /// Items at [`CRITICAL_SEVERITY`] or above.
    pub fn critical_items(&self) -> usize {
        self.intel
            .values()
            .flatten()
            .filter(|i| i.is_critical())
            .count()
    }
}

/// Per-agent status reported by the fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProgress {
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentProgress {
    pub fn running(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Running,
            count: None,
            message: Some("scanning".to_string()),
        }
    }

    pub fn done(agent_id: &str, count: usize) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Done,
            count: Some(count),
            message: Some(format!("{} reports", count)),
        }
    }

    pub fn error(agent_id: &str, message: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Error,
            count: None,
            message: Some(message.chars().take(100).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    System,
    Success,
    Error,
    Alert,
    Info,
}

/// A line for the operator-facing activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub time: DateTime<Local>,
    pub message: String,
    pub kind: LogKind,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, kind: LogKind) -> Self {
        Self {
            time: Local::now(),
            message: message.into(),
            kind,
        }
    }
}

/// Everything the pipeline tells the presentation layer.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Update(CycleUpdate),
    Progress(AgentProgress),
    Log(LogEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent() -> Agent {
        Agent {
            id: "sigint".to_string(),
            name: "SIGINT".to_string(),
            full_name: "Signal Intelligence".to_string(),
            icon: "📡".to_string(),
            description: String::new(),
            queries: vec!["strikes".to_string()],
            sources: vec![],
            model: None,
            interval_secs: 60,
        }
    }

    #[test]
    fn test_severity_normalization() {
        assert_eq!(normalize_severity(Some(&json!(9))), 5);
        assert_eq!(normalize_severity(Some(&json!(-2))), 1);
        assert_eq!(normalize_severity(Some(&json!(4))), 4);
        assert_eq!(normalize_severity(Some(&json!("2"))), 2);
        assert_eq!(normalize_severity(Some(&json!(2.6))), 3);
        assert_eq!(normalize_severity(Some(&json!("high"))), DEFAULT_SEVERITY);
        assert_eq!(normalize_severity(Some(&json!(null))), DEFAULT_SEVERITY);
        assert_eq!(normalize_severity(Some(&json!(0))), DEFAULT_SEVERITY);
        assert_eq!(normalize_severity(Some(&json!(true))), DEFAULT_SEVERITY);
        assert_eq!(normalize_severity(None), DEFAULT_SEVERITY);
    }

    #[test]
    fn test_severity_level() {
        assert_eq!(SeverityLevel::from_score(5), SeverityLevel::Critical);
        assert_eq!(SeverityLevel::from_score(4), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_score(3), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_score(1), SeverityLevel::Low);
        assert!(SeverityLevel::Low < SeverityLevel::Critical);
        assert_eq!(SeverityLevel::Critical.emoji(), "🔴");
    }

    #[test]
    fn test_intel_item_from_value() {
        let value = json!({
            "headline": "Strike reported",
            "summary": "...",
            "source": "X",
            "time": "1h ago",
            "severity": 9,
            "verified": true,
            "location": "Isfahan",
            "confidence_hint": "low"
        });

        let item = IntelItem::from_value(&value, &agent(), "model-a", 42).unwrap();
        assert_eq!(item.headline, "Strike reported");
        assert_eq!(item.severity, 5);
        assert!(item.verified);
        assert_eq!(item.location.as_deref(), Some("Isfahan"));
        assert_eq!(item.agent_id, "sigint");
        assert_eq!(item.category, "SIGINT");
        assert_eq!(item.model, "model-a");
        assert_eq!(item.fetched_at, 42);
        assert_eq!(item.extra.get("confidence_hint"), Some(&json!("low")));
    }

    #[test]
    fn test_intel_item_requires_headline() {
        assert!(IntelItem::from_value(&json!({"summary": "x"}), &agent(), "m", 0).is_none());
        assert!(IntelItem::from_value(&json!("text"), &agent(), "m", 0).is_none());
    }

    #[test]
    fn test_analysis_partial_and_clamped() {
        let value = json!({
            "threat_level": 14,
            "threat_label": "DEFCON 2",
            "escalation_probability": 130,
            "nuclear_risk": "-5",
            "key_risks": ["a", "b", 3],
            "custom": {"k": 1}
        });

        let analysis = Analysis::from_value(&value).unwrap();
        assert_eq!(analysis.threat_level, Some(10));
        assert_eq!(analysis.threat_label.as_deref(), Some("DEFCON 2"));
        assert_eq!(analysis.escalation_probability, Some(100));
        assert_eq!(analysis.nuclear_risk, Some(0));
        assert_eq!(analysis.key_risks, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(analysis.situation_summary.is_none());
        assert!(analysis.extra.contains_key("custom"));
        assert!(Analysis::from_value(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_verification_vote_from_value() {
        let vote = VerificationVote::from_value(
            &json!({"verified": true, "confidence": 140, "corroborating_sources": ["AP"], "notes": ""}),
            "m1",
        )
        .unwrap();
        assert!(vote.verified);
        assert_eq!(vote.confidence, 100);
        assert_eq!(vote.sources, vec!["AP".to_string()]);
        assert!(vote.notes.is_none());
    }

    #[test]
    fn test_cycle_update_counts() {
        let item = IntelItem::from_value(&json!({"headline": "a", "severity": 4}), &agent(), "m", 0)
            .unwrap();
        let low = IntelItem {
            severity: 2,
            ..item.clone()
        };
        let mut intel = IntelMap::new();
        intel.insert("sigint".to_string(), vec![item, low]);
        intel.insert("osint".to_string(), vec![]);

        let update = CycleUpdate {
            cycle: 1,
            timestamp: Utc::now(),
            intel,
            analysis: None,
            breaking: vec![],
        };
        assert_eq!(update.total_items(), 2);
        assert_eq!(update.critical_items(), 1);
    }

    #[test]
    fn test_progress_error_truncates() {
        let long = "x".repeat(300);
        let progress = AgentProgress::error("osint", &long);
        assert_eq!(progress.status, AgentStatus::Error);
        assert_eq!(progress.message.unwrap().len(), 100);
    }
}
