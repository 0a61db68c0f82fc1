//! mp-spider main entry point
//!
//! This is the command-line interface for maintaining the spider's database.
//! The proxy host embeds the library's `ProxyRule`; this binary validates
//! configuration, seeds accounts and reports progress.

use anyhow::{bail, Context};
use clap::Parser;
use mp_spider::config::{load_config_with_hash, Config};
use mp_spider::dispatch::SpiderContext;
use mp_spider::queue::MemoryQueue;
use mp_spider::storage::{open_storage, AccountPatch, SqliteStorage, Storage};
use mp_spider::ProxyRule;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// mp-spider: content harvesting through an intercepting proxy
///
/// The spider extracts articles, accounts, comments and read metrics from
/// traffic a proxy host intercepts, and keeps the client walking through
/// article and history pages on its own.
#[derive(Parser, Debug)]
#[command(name = "mp-spider")]
#[command(version = "1.0.0")]
#[command(about = "Content harvesting through an intercepting proxy", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show how the proxy rule would run
    #[arg(long, conflicts_with_all = ["stats", "add_account"])]
    dry_run: bool,

    /// Show statistics from the database and exit (default)
    #[arg(long, conflicts_with_all = ["dry_run", "add_account"])]
    stats: bool,

    /// Register account ids (`__biz`) for the account queue and exit
    #[arg(long, value_name = "BIZ", num_args = 1.., conflicts_with_all = ["dry_run", "stats"])]
    add_account: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(config)?;
    } else if !cli.add_account.is_empty() {
        handle_add_accounts(&config, &cli.add_account).await?;
    } else {
        handle_stats(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("mp_spider=info,warn"),
            1 => EnvFilter::new("mp_spider=debug,info"),
            2 => EnvFilter::new("mp_spider=trace,debug"),
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

/// Opens the configured database, creating its schema on first use
fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles the --dry-run mode: validates config and builds the rule in memory
fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    println!("=== mp-spider Dry Run ===\n");

    println!("Article Pages:");
    if config.page.disable {
        println!("  Auto-advance: disabled");
    } else {
        println!(
            "  Auto-advance: every {}s (+ up to {}s)",
            config.page.jump_interval, config.page.jump_random
        );
    }
    println!(
        "  Publish window: {} .. {}",
        config.page.min_time,
        config
            .page
            .max_time
            .map(|t| t.to_string())
            .unwrap_or_else(|| "now".to_string())
    );
    if config.page.crawl_existing {
        println!(
            "  Revisit measured articles within {}s of publishing",
            config.page.crawl_existing_interval
        );
    }
    println!(
        "  Save content: {}",
        if config.page.save_content {
            format!("{:?}", config.page.content_format)
        } else {
            "no".to_string()
        }
    );

    println!("\nHistory Pages:");
    println!("  Account walk: {}", if config.profile.disable { "disabled" } else { "enabled" });
    println!("  Walk back to: {}", config.profile.min_time);
    println!("  Scroll interval: {}s", config.profile.jump_interval);
    println!("  Revisit interval: {}s", config.profile.revisit_interval);

    println!("\nRules:");
    println!("  Replace post body: {}", config.rule.replace_post_body);
    println!("  Crawl comments: {}", config.rule.crawl_comments);
    println!("  Replace images: {}", config.rule.replace_images);
    println!("  Proxy auth: {}", config.auth.is_some());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    let context = SpiderContext::new(
        config,
        Arc::new(SqliteStorage::new_in_memory()?),
        Arc::new(MemoryQueue::new()),
    );
    let rule = ProxyRule::new(context)?;

    println!("\n✓ Configuration is valid");
    println!("✓ Response handlers: {}", rule.handler_names().join(", "));

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use mp_spider::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&storage).await?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --add-account: registers accounts so the account refill picks them up
async fn handle_add_accounts(config: &Config, account_ids: &[String]) -> anyhow::Result<()> {
    if let Some(empty) = account_ids.iter().find(|id| id.trim().is_empty()) {
        bail!("Invalid account id: {:?}", empty);
    }

    let storage = open_database(config)?;
    for account_id in account_ids {
        let account_id = account_id.trim();
        storage
            .upsert_account(account_id, &AccountPatch::default())
            .await?;
        tracing::info!("Registered account {}", account_id);
    }

    println!("✓ Registered {} accounts", account_ids.len());

    Ok(())
}
