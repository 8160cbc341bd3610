//! Crawl-Relay main entry point
//!
//! This is the command-line interface for the Crawl-Relay site crawler.

use anyhow::{Context, Result};
use clap::Parser;
use crawl_relay::config::{load_config_with_hash, validate, Config, ConfigOverrides};
use crawl_relay::crawler::{choose_start, install_panic_hook, Engine, SnapshotWriter, StartMode};
use crawl_relay::output::{generate_markdown_report, print_summary, RunStatus};
use crawl_relay::publish::DirectoryPublisher;
use crawl_relay::storage::{ResumeStore, StateStore};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Crawl-Relay: a resumable site crawler
///
/// Crawl-Relay crawls a single site, discovers its pages, images and
/// redirects, and relays each of them to a publisher. An interrupted crawl
/// can be resumed from where it stopped.
#[derive(Parser, Debug)]
#[command(name = "crawl-relay")]
#[command(version)]
#[command(about = "A resumable site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URL, overriding project.url
    #[arg(long)]
    url: Option<String>,

    /// Rewrite absolute links to the site into root-relative links
    #[arg(long)]
    rewrite: bool,

    /// Ask the publisher to look for attachments in published markup
    #[arg(long)]
    attachments: bool,

    /// Milliseconds between dispatch ticks
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Keep cookies between requests
    #[arg(long)]
    cookies: bool,

    /// Maximum number of concurrent fetches
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Maximum resource size in bytes
    #[arg(long, value_name = "BYTES")]
    size: Option<u64>,

    /// Honor robots.txt
    #[arg(long)]
    robots: bool,

    /// Ignore any saved crawl state and start from the seed
    #[arg(long)]
    skip_resume: bool,

    /// Never prompt; resume saved state automatically
    #[arg(long)]
    no_interaction: bool,

    /// JSON array of extra URLs to queue on a fresh crawl
    #[arg(long, value_name = "PATH")]
    urls_file: Option<PathBuf>,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            interval: self.interval,
            concurrency: self.concurrency,
            max_resource_size: self.size,
            accept_cookies: self.cookies,
            respect_robots: self.robots,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    config.apply_overrides(&cli.overrides());
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    handle_crawl(&cli, config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_relay=info,warn"),
            1 => EnvFilter::new("crawl_relay=debug,info"),
            2 => EnvFilter::new("crawl_relay=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the merged configuration
fn handle_dry_run(config: &Config) -> Result<()> {
    let seed = config.seed_url()?;

    println!("=== Crawl-Relay Dry Run ===\n");
    println!("Seed: {}", seed);
    println!("Resume file: {}", config.resume_filename());

    println!("\nCrawler:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Interval: {}ms", config.crawler.interval);
    println!("  Max resource size: {} bytes", config.crawler.max_resource_size);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Accept cookies: {}", config.crawler.accept_cookies);
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    if let Some(report) = &config.output.report_path {
        println!("  Report: {}", report.display());
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(cli: &Cli, config: Config, config_hash: Option<String>) -> Result<ExitCode> {
    let seed = config.seed_url()?;
    let filename = config.resume_filename();
    let store = ResumeStore::new(&config.project.config_dir);
    let publisher = Arc::new(DirectoryPublisher::new(&config.output.directory));

    let engine = Engine::new(
        seed,
        config.engine_settings(cli.rewrite, cli.attachments),
        publisher,
        store.clone(),
        filename.clone(),
    )
    .context("failed to create crawl engine")?;

    let snapshot = store.load(&filename);
    match choose_start(snapshot, cli.skip_resume, cli.no_interaction, confirm_resume) {
        StartMode::Resume(items) => {
            tracing::info!("Resuming crawl from {} saved items", items.len());
            if cli.urls_file.is_some() {
                tracing::warn!("Resuming a saved crawl; ignoring --urls-file");
            }
            engine.restore(items);
        }
        StartMode::Fresh => {
            tracing::info!("Starting fresh crawl of {}", engine.seed());
            engine.seed_queue();
            if let Some(path) = &cli.urls_file {
                engine.inject(&read_urls_file(path)?);
            }
        }
    }

    install_panic_hook(engine.snapshot_writer());

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone(), engine.snapshot_writer());

    let mut summary = engine.run(cancel).await;
    if let Some(hash) = config_hash {
        summary = summary.with_config_hash(hash);
    }

    print_summary(&summary);

    if let Some(report_path) = &config.output.report_path {
        generate_markdown_report(&summary, report_path)
            .with_context(|| format!("failed to write report {}", report_path.display()))?;
        tracing::info!("Report written to {}", report_path.display());
    }

    Ok(match summary.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Interrupted => ExitCode::from(130),
    })
}

/// Asks on stdin whether to resume; an empty answer means yes
fn confirm_resume(unfinished: usize) -> bool {
    print!(
        "Found a saved crawl with {} unfinished items. Resume? [Y/n] ",
        unfinished
    );
    if std::io::stdout().flush().is_err() {
        return true;
    }

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => {
            let answer = answer.trim().to_ascii_lowercase();
            answer.is_empty() || answer == "y" || answer == "yes"
        }
        Err(e) => {
            tracing::warn!("Could not read answer, resuming: {}", e);
            true
        }
    }
}

/// Reads a JSON array of URL strings
fn read_urls_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read URL list {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("URL list {} is not a JSON array of strings", path.display()))
}

/// Cancels `cancel` on the first SIGINT or SIGTERM
///
/// A second signal exits right away, once the crawl state is on disk.
fn spawn_signal_listener(cancel: CancellationToken, writer: SnapshotWriter) {
    tokio::spawn(async move {
        wait_for_shutdown().await;
        tracing::warn!("Shutdown requested, saving crawl state (signal again to force exit)");
        cancel.cancel();

        wait_for_shutdown().await;
        tracing::warn!("Forced exit requested");
        writer.flush_interrupted().await;
        std::process::exit(130);
    });
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Could not listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
