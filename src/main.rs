//! Campus Cache CLI
//!
//! Operator tool around the preload cache: warm it for a subject, inspect
//! cached keys, clear it, and report freshness and metrics.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campus_cache::adapters::{FileKeyValueStore, LoggingEventPublisher, RestRecordStore, SystemClock};
use campus_cache::config::window_from_minutes;
use campus_cache::domain::EventPublisher;
use campus_cache::{
    AppConfig, CacheConfig, CacheManager, PreloadOrchestrator, PreloadOutcome, Role,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Campus Cache - preload and inspect the client-side school data cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "CAMPUS_CACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Realtime database base URL
    #[arg(long, env = "CAMPUS_DATABASE_URL")]
    database_url: Option<String>,

    /// Database auth token
    #[arg(long, env = "CAMPUS_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Directory for the durable cache tier
    #[arg(long, env = "CAMPUS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Freshness window in minutes
    #[arg(long, env = "CAMPUS_FRESHNESS_MINUTES")]
    freshness_minutes: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Warm the cache for a subject
    Preload {
        /// student, teacher, parent or admin
        #[arg(long)]
        role: String,

        /// Id of the subject's record in the role directory
        #[arg(long)]
        subject_id: String,

        /// Invalidate and refetch even if the cache is fresh
        #[arg(long)]
        force: bool,
    },

    /// Print a cached value
    Get {
        key: String,
    },

    /// Remove every cached key
    Clear,

    /// Print freshness and metrics
    Status,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;
    info!("Cache directory: {}", config.cache_dir.display());
    info!("Record store: {}", config.record_store.database_url);

    let events: Arc<dyn EventPublisher> = Arc::new(LoggingEventPublisher::new());
    let store = FileKeyValueStore::open(&config.cache_dir)
        .await
        .with_context(|| format!("opening cache directory {}", config.cache_dir.display()))?;
    let cache = Arc::new(CacheManager::with_parts(
        CacheConfig::from(&config.preload),
        Arc::new(store),
        events.clone(),
        Arc::new(SystemClock),
    ));
    let records = RestRecordStore::new(config.record_store.clone())
        .context("creating record store client")?;
    let orchestrator = Arc::new(PreloadOrchestrator::new(
        cache.clone(),
        Arc::new(records),
        events,
        config.preload.clone(),
    )?);

    match args.command {
        Command::Preload {
            role,
            subject_id,
            force,
        } => {
            let role: Role = role.parse()?;
            let subject = orchestrator
                .load_subject(role, &subject_id)
                .await
                .with_context(|| format!("loading {} {}", role, subject_id))?;

            let mut progress = orchestrator.subscribe_progress();
            let printer = tokio::spawn(async move {
                while let Some(event) = progress.recv().await {
                    eprintln!("[{}/{}] {}", event.step, event.total, event.message);
                    if event.is_complete {
                        break;
                    }
                }
            });

            let outcome = if force {
                orchestrator.refresh_data(&subject).await
            } else {
                orchestrator.preload_all_data(&subject).await
            };

            match outcome {
                PreloadOutcome::Skipped => printer.abort(),
                _ => {
                    let _ = printer.await;
                }
            }
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Get { key } => match orchestrator.get_cached_data(&key).await {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => bail!("no cached value for '{}'", key),
        },

        Command::Clear => {
            orchestrator.clear_cache().await;
            println!("Cache cleared");
        }

        Command::Status => {
            let fresh = cache.restore_freshness().await;
            let snapshot = cache.metrics();
            let status = json!({
                "fresh": fresh,
                "last_update": cache.last_write(),
                "freshness_window_minutes": config.preload.freshness_window.as_secs() / 60,
                "cache_dir": config.cache_dir,
                "memory_entries": snapshot.memory_entries,
                "durable_hits": snapshot.durable_hits,
                "decode_failures": snapshot.decode_failures,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            print!("{}", orchestrator.metrics().encode()?);
        }
    }

    cache.flush().await;
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(url) = &args.database_url {
        config.record_store.database_url = url.clone();
    }
    if let Some(token) = &args.auth_token {
        config.record_store.auth_token = Some(token.clone());
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(minutes) = args.freshness_minutes {
        config.preload.freshness_window = window_from_minutes(minutes)?;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr so command output on stdout stays machine-readable.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
