//! Intelwatch - multi-agent LLM intelligence watch
//!
//! A CLI tool that polls a set of collection agents through an
//! OpenAI-compatible model endpoint on a fixed interval, ranks and
//! deduplicates what they report, and writes a situation report after
//! every cycle.
//!
//! Exit codes:
//!   0 - Success (including Ctrl-C shutdown)
//!   1 - Runtime error (config, missing key, report write failure, etc.)

mod agent;
mod analysis;
mod cli;
mod config;
mod cycle;
mod gateway;
mod keystore;
mod models;
mod report;

use analysis::{all_items_by_severity, fingerprint, verify, FingerprintSet};
use anyhow::{bail, Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use cycle::CycleManager;
use futures::future::join_all;
use gateway::{HttpGateway, ModelGateway};
use keystore::{resolve_api_key, KeyStore};
use models::{CycleUpdate, LogKind, PipelineEvent};
use report::{AgentBoard, CycleReport, Ticker, VerifiedItem};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration loads before logging so `general.verbose` can apply.
    let (config, origin) = match prepare_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("Intelwatch v{}", env!("CARGO_PKG_VERSION"));
    origin.log();

    if let Err(e) = run(args, config).await {
        error!("Intelwatch failed: {}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .intelwatch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize agents, models, topic, and more.");
    Ok(())
}

/// Initialize logging at the merged verbosity level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Where the configuration came from, reported once logging is up.
enum ConfigOrigin {
    File(PathBuf),
    BuiltIn,
    Unreadable(String),
}

impl ConfigOrigin {
    fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::BuiltIn => debug!("No config file found, using defaults"),
            ConfigOrigin::Unreadable(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigOrigin::File(config_path.clone())));
    }

    // Try default location
    let loaded = match Config::load_default() {
        Ok(Some(config)) => (config, ConfigOrigin::File(PathBuf::from(DEFAULT_CONFIG_FILE))),
        Ok(None) => (Config::default(), ConfigOrigin::BuiltIn),
        Err(e) => (Config::default(), ConfigOrigin::Unreadable(format!("{:#}", e))),
    };
    Ok(loaded)
}

/// Load, apply CLI overrides and validate.
fn prepare_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    let (mut config, origin) = load_config(args)?;
    config.merge_with_args(args);
    config.validate().context("Invalid configuration")?;
    Ok((config, origin))
}

/// State the presentation layer keeps between updates.
struct Session {
    previous: FingerprintSet,
    ticker: Ticker,
}

/// Resolve everything, then drive cycles until the limit or Ctrl-C.
async fn run(args: Args, config: Config) -> Result<()> {
    let store = KeyStore::new(&config.general.key_file);
    if args.save_key {
        if let Some(ref key) = args.api_key {
            store.save(key)?;
            println!("🔑 API key saved to {}", store.path().display());
        }
    }

    let resolved = resolve_api_key(args.api_key.as_deref(), &config.gateway.api_key_env, &store)?;
    let http_gateway = HttpGateway::new(config.gateway_config())?;

    if args.health {
        let health = http_gateway.health(resolved.as_ref().map(|(key, _)| key.as_str()));
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    let Some((api_key, source)) = resolved else {
        bail!(
            "No API key. Pass --api-key, set INTEL_API_KEY or {}, or save one with --save-key",
            config.gateway.api_key_env
        );
    };
    info!("Using API key from {}", source);

    let gateway: Arc<dyn ModelGateway> = Arc::new(http_gateway);
    let (events, mut rx) = unbounded_channel();
    let manager = CycleManager::new(
        Arc::clone(&gateway),
        api_key.clone(),
        config.agents.clone(),
        config.cycle_settings(),
        events,
    );

    if !args.quiet {
        print_banner(&config, &args);
    }

    let board = AgentBoard::new(&config.agents, !args.quiet);
    let mut session = Session {
        previous: FingerprintSet::default(),
        ticker: Ticker::default(),
    };

    if args.once {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager.manual_refresh().await;
        });
    } else {
        manager.start(config.refresh_interval());
    }

    let limit = args.cycle_limit();
    let mut updates = 0u64;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PipelineEvent::Progress(progress)) => board.update(&progress),
                Some(PipelineEvent::Log(log)) => {
                    if log.kind == LogKind::Alert {
                        board.println(&format!("🚨 {}", log.message));
                    }
                }
                Some(PipelineEvent::Update(update)) => {
                    handle_update(update, &config, &args, gateway.as_ref(), &api_key, &mut session, &board)
                        .await?;
                    updates += 1;
                    if limit.is_some_and(|n| updates >= n) {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                board.println("🛑 Interrupted, stopping...");
                break;
            }
        }
    }

    manager.stop();
    board.clear();

    if !args.quiet {
        println!(
            "\n✅ Done after {} cycle(s). Last report: {}",
            updates, config.general.output
        );
    }

    Ok(())
}

fn print_banner(config: &Config, args: &Args) {
    println!("🛰️  Intelwatch: {}", config.general.topic);
    println!("   Agents: {}", config.agents.len());
    println!("   Endpoint: {}", config.gateway.base_url);
    println!("   Synthesis model: {}", config.models.synthesis);
    match config.fanout_policy() {
        agent::FanoutPolicy::Concurrent => println!("   Fan-out: all agents at once"),
        agent::FanoutPolicy::Batched { size, pause } => println!(
            "   Fan-out: batches of {} ({}ms apart)",
            size,
            pause.as_millis()
        ),
    }
    if args.once {
        println!("   Mode: single cycle");
    } else {
        println!("   Refresh: every {}s", config.general.refresh_interval_secs);
    }
    if args.verify_top > 0 {
        println!(
            "   Verifying top {} reports with {} models",
            args.verify_top,
            config.models.verification.len()
        );
    }
    println!();
}

/// Mark new items, verify, render and write one update.
async fn handle_update(
    update: CycleUpdate,
    config: &Config,
    args: &Args,
    gateway: &dyn ModelGateway,
    api_key: &str,
    session: &mut Session,
    board: &AgentBoard,
) -> Result<()> {
    let new_fingerprints: HashSet<String> = update
        .intel
        .values()
        .flatten()
        .filter(|item| session.previous.is_new(item))
        .map(|item| fingerprint(&item.headline))
        .collect();

    // An empty cycle keeps the last good data as the comparison base.
    if update.total_items() > 0 {
        session.previous = FingerprintSet::from_intel(&update.intel);
    }
    session.ticker.push_cycle(&update.breaking);

    let verifications = if args.verify_top > 0 && update.total_items() > 0 {
        board.println(&format!("🔎 Cross-verifying top {} reports...", args.verify_top));
        verify_top(gateway, api_key, &update, config, args.verify_top).await
    } else {
        Vec::new()
    };

    let threat = update
        .analysis
        .as_ref()
        .and_then(|a| a.threat_level)
        .map(|level| format!(" | threat {}/10", level))
        .unwrap_or_default();
    let summary = format!(
        "📊 Cycle #{}: {} reports ({} critical, {} new){}",
        update.cycle,
        update.total_items(),
        update.critical_items(),
        new_fingerprints.len(),
        threat
    );

    let report = CycleReport::new(
        update,
        &config.agents,
        new_fingerprints,
        verifications,
        session.ticker.entries(),
    );
    let content = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let path = PathBuf::from(&config.general.output);
    report::write_report(&content, &path)?;

    board.println(&summary);
    board.println(&format!("📝 Report saved to: {}", path.display()));
    Ok(())
}

/// Cross-verify the `n` most severe items of an update.
async fn verify_top(
    gateway: &dyn ModelGateway,
    api_key: &str,
    update: &CycleUpdate,
    config: &Config,
    n: usize,
) -> Vec<VerifiedItem> {
    let top: Vec<_> = all_items_by_severity(&update.intel)
        .into_iter()
        .take(n)
        .collect();

    let results = join_all(top.iter().map(|item| {
        verify(
            gateway,
            api_key,
            item,
            &config.models.verification,
            &config.general.language,
            config.gateway.max_tokens.verification,
        )
    }))
    .await;

    top.into_iter()
        .zip(results)
        .map(|(item, result)| VerifiedItem {
            agent_id: item.agent_id,
            headline: item.headline,
            severity: item.severity,
            result,
        })
        .collect()
}
