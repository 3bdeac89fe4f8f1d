//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.intelwatch.toml` files. Everything here is read once at startup and
//! handed to the pipeline explicitly.

use crate::agent::{Briefing, FanoutPolicy, QueryStrategy, TokenBudget};
use crate::cycle::CycleSettings;
use crate::gateway::http::HttpGatewayConfig;
use crate::models::{Agent, ModelInfo, ModelStrength};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".intelwatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Upstream endpoint settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Model registry and role assignments.
    #[serde(default)]
    pub models: ModelsConfig,

    /// Fan-out settings.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Collection agents.
    #[serde(default = "default_agents")]
    pub agents: Vec<Agent>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            gateway: GatewayConfig::default(),
            models: ModelsConfig::default(),
            fanout: FanoutConfig::default(),
            agents: default_agents(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Seconds between scheduled cycles.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Subject every prompt is about.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Free-text date hint, e.g. "Today is February 28, 2026."
    #[serde(default)]
    pub date_label: Option<String>,

    /// Language for prose in model replies.
    #[serde(default = "default_language")]
    pub language: String,

    /// Items requested from each collection call.
    #[serde(default = "default_items_per_query")]
    pub items_per_query: usize,

    /// News outlets mentioned in prompts.
    #[serde(default = "default_news_sources")]
    pub news_sources: Vec<String>,

    /// Default report path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Where the API key is persisted.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            topic: default_topic(),
            date_label: None,
            language: default_language(),
            items_per_query: default_items_per_query(),
            news_sources: default_news_sources(),
            output: default_output(),
            key_file: default_key_file(),
            verbose: false,
        }
    }
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_topic() -> String {
    "Iran-Israel-US conflict".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_items_per_query() -> usize {
    4
}

fn default_news_sources() -> Vec<String> {
    vec![
        "Reuters",
        "Associated Press",
        "Al Jazeera",
        "BBC World",
        "CNN",
        "The Guardian",
        "Times of Israel",
        "Jerusalem Post",
        "Iran International",
        "Middle East Eye",
        "The War Zone",
        "Defense One",
        "Breaking Defense",
        "Janes Defence",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_output() -> String {
    "intel_report.md".to_string()
}

fn default_key_file() -> String {
    crate::keystore::DEFAULT_KEY_FILE.to_string()
}

/// Upstream endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// OpenAI-compatible chat completions URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable consulted for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sent as `HTTP-Referer`.
    #[serde(default = "default_referer")]
    pub referer: Option<String>,

    /// Sent as `X-Title`.
    #[serde(default = "default_title")]
    pub title: Option<String>,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Reply token limits per kind of call.
    #[serde(default)]
    pub max_tokens: TokenBudget,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
            temperature: default_temperature(),
            max_tokens: TokenBudget::default(),
            referer: default_referer(),
            title: default_title(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

fn default_referer() -> Option<String> {
    Some("https://github.com/intelwatch/intelwatch".to_string())
}

fn default_title() -> Option<String> {
    Some("Intelwatch".to_string())
}

fn default_system_prompt() -> String {
    "You are an elite military intelligence analyst specializing in Middle East geopolitics \
     (Iran-Israel-US conflict). Provide detailed, structured intelligence reports. Always \
     respond with valid JSON when asked. Use the most recent knowledge available. Respond \
     based on real events and verified information."
        .to_string()
}

/// Model registry and role assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Fallback priority order for collection calls.
    #[serde(default = "default_collection_models")]
    pub collection: Vec<String>,

    /// Model asked for the situation assessment.
    #[serde(default = "default_synthesis_model")]
    pub synthesis: String,

    /// Models polled by cross-verification.
    #[serde(default = "default_verification_models")]
    pub verification: Vec<String>,

    /// Every model the tool knows about.
    #[serde(default = "default_registry")]
    pub registry: Vec<ModelInfo>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            collection: default_collection_models(),
            synthesis: default_synthesis_model(),
            verification: default_verification_models(),
            registry: default_registry(),
        }
    }
}

fn default_registry() -> Vec<ModelInfo> {
    let entry = |id: &str, name: &str, provider: &str, strength| ModelInfo {
        id: id.to_string(),
        name: name.to_string(),
        provider: provider.to_string(),
        strength,
    };
    vec![
        entry(
            "google/gemini-2.5-pro-exp-03-25:free",
            "Gemini 2.5 Pro",
            "Google",
            ModelStrength::Flagship,
        ),
        entry(
            "deepseek/deepseek-chat-v3-0324:free",
            "DeepSeek V3",
            "DeepSeek",
            ModelStrength::Strong,
        ),
        entry(
            "meta-llama/llama-4-scout:free",
            "Llama 4 Scout",
            "Meta",
            ModelStrength::Strong,
        ),
        entry(
            "qwen/qwen2.5-vl-72b-instruct:free",
            "Qwen 2.5 72B",
            "Alibaba",
            ModelStrength::Strong,
        ),
        entry(
            "mistralai/mistral-small-3.1-24b-instruct:free",
            "Mistral Small 3.1",
            "Mistral",
            ModelStrength::Fast,
        ),
    ]
}

fn default_collection_models() -> Vec<String> {
    default_registry().into_iter().map(|m| m.id).collect()
}

fn default_synthesis_model() -> String {
    "google/gemini-2.5-pro-exp-03-25:free".to_string()
}

fn default_verification_models() -> Vec<String> {
    vec![
        "deepseek/deepseek-chat-v3-0324:free".to_string(),
        "meta-llama/llama-4-scout:free".to_string(),
        "qwen/qwen2.5-vl-72b-instruct:free".to_string(),
    ]
}

/// Agent admission policy as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    Concurrent,
    #[default]
    Batched,
}

/// Fan-out settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    #[serde(default)]
    pub policy: FanoutMode,

    /// Agents per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches in milliseconds.
    #[serde(default = "default_batch_pause")]
    pub batch_pause_ms: u64,

    /// One combined prompt per agent, or one call per query template.
    #[serde(default)]
    pub strategy: QueryStrategy,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            policy: FanoutMode::default(),
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause(),
            strategy: QueryStrategy::default(),
        }
    }
}

fn default_batch_size() -> usize {
    2
}

fn default_batch_pause() -> u64 {
    1000
}

#[allow(clippy::too_many_arguments)]
fn agent(
    id: &str,
    name: &str,
    full_name: &str,
    icon: &str,
    description: &str,
    queries: &[&str],
    interval_secs: u64,
    sources: &[&str],
) -> Agent {
    Agent {
        id: id.to_string(),
        name: name.to_string(),
        full_name: full_name.to_string(),
        icon: icon.to_string(),
        description: description.to_string(),
        queries: queries.iter().map(|q| q.to_string()).collect(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
        model: None,
        interval_secs,
    }
}

/// The seven stock collection agents.
pub fn default_agents() -> Vec<Agent> {
    vec![
        agent(
            "sigint",
            "SIGINT",
            "Signal Intelligence",
            "📡",
            "Military operations, airstrikes, air defense",
            &[
                "Iran Israel military strikes airstrikes latest today 2026",
                "US military operations Iran Gulf strikes February 2026",
                "Iran air defense missile launches Israel attack today",
            ],
            60,
            &["sentdefender", "Osinttechnical", "ELINTNews", "IntelSky", "clashreport"],
        ),
        agent(
            "osint",
            "OSINT",
            "Open Source Intelligence",
            "🔍",
            "Open-source reporting, verified reports",
            &[
                "Iran Israel war OSINT update February 28 2026",
                "Middle East conflict latest verified reports today",
            ],
            60,
            &["Osint613", "AuroraIntel", "OSINTWarfare", "bellingcat", "IntelCrab"],
        ),
        agent(
            "humint",
            "HUMINT",
            "Human Intelligence",
            "👤",
            "Casualties, ground reports, civilian impact",
            &[
                "Iran war casualties civilian damage report February 2026",
                "Iran Israel conflict ground reports humanitarian impact today",
            ],
            90,
            &["TreyYingst", "QalaatAlMudiq", "Faytuks", "AlMonitor"],
        ),
        agent(
            "geoint",
            "GEOINT",
            "Geospatial Intelligence",
            "🛰️",
            "Satellite imagery, operations maps, deployments",
            &[
                "Iran Israel satellite imagery military deployment map 2026",
                "Iran military bases damage satellite assessment February 2026",
            ],
            120,
            &["oryxspioenkop", "TheStudyofWar", "bellingcat", "sector035"],
        ),
        agent(
            "econint",
            "ECONINT",
            "Economic Intelligence",
            "📊",
            "Oil prices, sanctions, financial market impact",
            &[
                "Strait of Hormuz oil prices Iran war economic impact 2026",
                "global markets oil price Iran Israel conflict February 2026",
                "Iran sanctions economic warfare impact today",
            ],
            90,
            &["spectatorindex", "ianbremmer", "AlMonitor"],
        ),
        agent(
            "proxy",
            "PROXY",
            "Proxy Forces Monitor",
            "🎯",
            "Houthis, Hezbollah, pro-Iran militias",
            &[
                "Houthis Hezbollah Iran proxy attacks Red Sea February 2026",
                "Iran proxy forces Iraq Syria Lebanon attacks today 2026",
            ],
            60,
            &["criticalthreats", "MENA_Analyst", "IntelCrab", "nexta_tv"],
        ),
        agent(
            "diplo",
            "DIPLO",
            "Diplomatic Intelligence",
            "🏛️",
            "Negotiations, international reactions, UN, NATO",
            &[
                "Iran Israel ceasefire negotiations diplomatic efforts 2026",
                "UN Security Council Iran Israel war response February 2026",
                "NATO response Iran conflict diplomatic channels today",
            ],
            120,
            &["tparsi", "ianbremmer", "dandrezner", "RichGoldbergDC"],
        ),
    ]
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(interval) = args.interval {
            self.general.refresh_interval_secs = interval;
        }
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref language) = args.language {
            self.general.language = language.clone();
        }
        if let Some(ref date_label) = args.date_label {
            self.general.date_label = Some(date_label.clone());
        }

        if args.no_batch {
            self.fanout.policy = FanoutMode::Concurrent;
        }
        if let Some(size) = args.batch_size {
            self.fanout.policy = FanoutMode::Batched;
            self.fanout.batch_size = size;
        }
        if args.per_template {
            self.fanout.strategy = QueryStrategy::PerTemplate;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.general.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be at least 1");
        }
        if self.general.items_per_query == 0 {
            bail!("items_per_query must be at least 1");
        }
        if !self.gateway.base_url.starts_with("http://")
            && !self.gateway.base_url.starts_with("https://")
        {
            bail!("Gateway URL must start with 'http://' or 'https://'");
        }
        if !(0.0..=2.0).contains(&self.gateway.temperature) {
            bail!("Temperature must be between 0.0 and 2.0");
        }
        if self.fanout.policy == FanoutMode::Batched && self.fanout.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }

        if self.agents.is_empty() {
            bail!("At least one agent must be configured");
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                bail!("Agent '{}' has an empty id", agent.name);
            }
            if !seen.insert(agent.id.as_str()) {
                bail!("Duplicate agent id '{}'", agent.id);
            }
            if agent.queries.is_empty() {
                bail!("Agent '{}' has no queries", agent.id);
            }
        }

        let known: HashSet<&str> = self.models.registry.iter().map(|m| m.id.as_str()).collect();
        if self.models.collection.is_empty() {
            bail!("models.collection must name at least one model");
        }
        if !known.contains(self.models.synthesis.as_str()) {
            bail!(
                "Synthesis model '{}' is not in the model registry",
                self.models.synthesis
            );
        }
        for id in &self.models.verification {
            if !known.contains(id.as_str()) {
                bail!("Verification model '{}' is not in the model registry", id);
            }
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.general.refresh_interval_secs)
    }

    pub fn briefing(&self) -> Briefing {
        Briefing {
            topic: self.general.topic.clone(),
            date_label: self.general.date_label.clone(),
            language: self.general.language.clone(),
            items_per_query: self.general.items_per_query,
            news_sources: self.general.news_sources.clone(),
            tokens: self.gateway.max_tokens,
        }
    }

    pub fn fanout_policy(&self) -> FanoutPolicy {
        match self.fanout.policy {
            FanoutMode::Concurrent => FanoutPolicy::Concurrent,
            FanoutMode::Batched => FanoutPolicy::Batched {
                size: self.fanout.batch_size,
                pause: Duration::from_millis(self.fanout.batch_pause_ms),
            },
        }
    }

    pub fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            briefing: self.briefing(),
            strategy: self.fanout.strategy,
            fanout: self.fanout_policy(),
            synthesis_model: self.models.synthesis.clone(),
        }
    }

    pub fn gateway_config(&self) -> HttpGatewayConfig {
        HttpGatewayConfig {
            url: self.gateway.base_url.clone(),
            system_prompt: self.gateway.system_prompt.clone(),
            temperature: self.gateway.temperature,
            timeout_seconds: self.gateway.timeout_seconds,
            fallback_order: self.models.collection.clone(),
            referer: self.gateway.referer.clone(),
            title: self.gateway.title.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
