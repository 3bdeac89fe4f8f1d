//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Intelwatch - multi-agent LLM intelligence watch
///
/// Polls a set of collection agents through an OpenAI-compatible model
/// endpoint, deduplicates and ranks what they report, and writes a
/// situation report every cycle.
///
/// Examples:
///   intelwatch --once
///   intelwatch --interval 120 --verify-top 3
///   intelwatch --cycles 5 --format json --output intel.json
///   intelwatch --api-key sk-or-... --save-key --health
///   intelwatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .intelwatch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// API key for the model endpoint
    ///
    /// Falls back to the environment variable named in the config
    /// (OPENROUTER_API_KEY by default), then to the saved key.
    #[arg(long, env = "INTEL_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Persist the key given with --api-key for later runs
    #[arg(long, requires = "api_key")]
    pub save_key: bool,

    /// Seconds between cycles (overrides config)
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long, conflicts_with = "cycles")]
    pub once: bool,

    /// Stop after this many cycle updates
    #[arg(long, value_name = "COUNT")]
    pub cycles: Option<u64>,

    /// Cross-verify the N most severe items of every update
    #[arg(long, default_value = "0", value_name = "N")]
    pub verify_top: usize,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Output file path for the report (overrides config)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Language for prose in model replies
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Date hint added to every prompt, e.g. "Today is March 2, 2026."
    #[arg(long, value_name = "TEXT")]
    pub date_label: Option<String>,

    /// Launch every agent at once instead of in batches
    #[arg(long, conflicts_with = "batch_size")]
    pub no_batch: bool,

    /// Agents per batch
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,

    /// Issue one call per query template instead of one combined prompt
    #[arg(long)]
    pub per_template: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print endpoint and key status as JSON and exit
    #[arg(long)]
    pub health: bool,

    /// Generate a default .intelwatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.interval == Some(0) {
            return Err("Interval must be at least 1 second".to_string());
        }

        if self.cycles == Some(0) {
            return Err("Cycles must be at least 1".to_string());
        }

        if self.batch_size == Some(0) {
            return Err("Batch size must be at least 1".to_string());
        }

        if self.save_key
            && self
                .api_key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
        {
            return Err("--save-key needs a non-empty --api-key".to_string());
        }

        Ok(())
    }

    /// Number of updates to wait for before exiting, if bounded.
    pub fn cycle_limit(&self) -> Option<u64> {
        if self.once {
            Some(1)
        } else {
            self.cycles
        }
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `general.verbose` setting; `--quiet` wins over both.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            api_key: None,
            save_key: false,
            interval: None,
            once: false,
            cycles: None,
            verify_top: 0,
            format: OutputFormat::Markdown,
            output: None,
            language: None,
            date_label: None,
            no_batch: false,
            batch_size: None,
            per_template: false,
            verbose: false,
            quiet: false,
            health: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "intelwatch",
            "--once",
            "--verify-top",
            "3",
            "--format",
            "json",
            "--no-batch",
        ])
        .unwrap();
        assert!(args.once);
        assert_eq!(args.verify_top, 3);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.no_batch);
        assert_eq!(args.cycle_limit(), Some(1));
    }

    #[test]
    fn test_once_conflicts_with_cycles() {
        assert!(Args::try_parse_from(["intelwatch", "--once", "--cycles", "3"]).is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.interval = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.cycles = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.batch_size = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_save_key_needs_key() {
        let mut args = make_args();
        args.save_key = true;
        args.api_key = Some("  ".to_string());
        assert!(args.validate().is_err());

        args.api_key = Some("sk-or-1".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_cycle_limit() {
        let mut args = make_args();
        assert_eq!(args.cycle_limit(), None);
        args.cycles = Some(4);
        assert_eq!(args.cycle_limit(), Some(4));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
