//! # Ranker Configuration Validator
//!
//! Command-line tool for validating ranker configuration files across
//! environments before a search service is started with them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ranker_core::config::ConfigManager;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate ranker configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Print the effective configuration as sanitized JSON
    Show,

    /// List environment overlays found in the config directory
    Environments,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Environments) => list_environments(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Ranker Configuration");
    println!("Environment: {}", cli.environment);

    let manager = load(cli)?;
    let config = manager.config();

    println!("✅ Configuration loaded from {}", manager.config_directory().display());
    println!(
        "   search: max_page={} retries={} concurrency={} budget={}ms tiers={:?}",
        config.search.max_page,
        config.search.max_retries,
        config.search.max_concurrent_fetches,
        config.search.timeout_budget_ms,
        config.search.tiers.pages_for(config.search.max_page),
    );
    println!(
        "   binder: min_quota={} max_age={}s max_fail={} cooldown={}s random_fallback={}",
        config.binder.min_remaining_quota,
        config.binder.max_session_age_secs,
        config.binder.max_fail_count,
        config.binder.reuse_cooldown_secs,
        config.binder.allow_random_fallback,
    );
    println!(
        "   circuit_breaker: ip_threshold={} subnet_threshold={} cooldown={}s",
        config.circuit_breaker.failure_threshold,
        config.circuit_breaker.subnet_threshold(),
        config.circuit_breaker.cooldown_secs,
    );

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn show(cli: &Cli) -> Result<()> {
    let manager = load(cli)?;
    let json = serde_json::to_string_pretty(&manager.debug_config())
        .context("serializing configuration")?;
    println!("{json}");
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<()> {
    let base = cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("config"));
    let dir = base.join("environments");

    println!("📋 Available Environments:");
    let entries = std::fs::read_dir(&dir)
        .with_context(|| format!("reading {}", dir.display()))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            (path.extension().and_then(|e| e.to_str()) == Some("yaml"))
                .then(|| path.file_stem()?.to_str().map(str::to_string))
                .flatten()
        })
        .collect();
    names.sort();

    for name in names {
        println!("  • {name}");
    }
    Ok(())
}
