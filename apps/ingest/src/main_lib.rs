use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use boursomatic_core::ingest::{load_universe, IngestConfig, Lookback, PacingConfig};
use boursomatic_core::{
    BarStore, CheckpointStore, DryRunBarStore, ExitStatus, FileCheckpointStore, IngestOrchestrator,
};
use boursomatic_market_data::{
    BarProvider, Interval, Market, ProviderChain, RetryPolicy, StooqProvider, Symbol,
    YahooProvider,
};
use boursomatic_storage_sqlite::BarRepository;

use crate::cli::RunArgs;
use crate::config::Config;

pub fn init_tracing() {
    let log_format = std::env::var("BOURSO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Yahoo first, Stooq for whatever Yahoo could not serve.
pub fn build_chain(config: &Config) -> Result<ProviderChain> {
    let policy = RetryPolicy::new(
        config.retry_attempts,
        config.retry_base_delay,
        config.retry_max_delay,
    )
    .context("invalid retry settings")?;
    let primary: Arc<dyn BarProvider> = Arc::new(YahooProvider::new(config.http_timeout));
    let fallback: Arc<dyn BarProvider> = Arc::new(StooqProvider::new(config.http_timeout));
    let chain = ProviderChain::resilient(primary, Some(fallback), policy);
    info!(
        primary = chain.primary_id(),
        fallback = ?chain.fallback_id(),
        attempts = config.retry_attempts,
        "provider chain ready"
    );
    Ok(chain)
}

/// Merge CLI flags over per-interval defaults.
pub fn ingest_config(args: &RunArgs, config: &Config) -> Result<IngestConfig> {
    let mut ingest = IngestConfig::for_interval(args.interval);

    if let Some(years) = args.years {
        ingest.lookback = Lookback::Years(years);
    }
    if let Some(days) = args.days {
        ingest.lookback = Lookback::Days(days);
    }

    let defaults = ingest.pacing.clone();
    ingest.pacing = PacingConfig::from_secs(
        args.batch_size.unwrap_or(defaults.batch_size()),
        args.symbol_delay
            .unwrap_or(defaults.per_symbol_delay().as_secs_f64()),
        args.batch_delay
            .unwrap_or(defaults.per_batch_delay().as_secs_f64()),
    )?;

    ingest.start_offset = args.start_offset;
    ingest.max_symbols = args.max_symbols;
    ingest.dry_run = args.dry_run;
    ingest.skip_covered = args.skip_covered;
    if let Some(target) = args.coverage_target {
        ingest.coverage_target = target;
    }
    ingest.max_consecutive_store_failures = config.max_store_failures;

    ingest.validate()?;
    Ok(ingest)
}

pub fn checkpoint_store(
    explicit: Option<PathBuf>,
    config: &Config,
    interval: Interval,
) -> FileCheckpointStore {
    match explicit {
        Some(path) => FileCheckpointStore::new(path),
        None => FileCheckpointStore::for_interval(&config.checkpoint_dir, interval),
    }
}

pub async fn run_ingest(args: RunArgs, config: Config) -> Result<ExitStatus> {
    let ingest = ingest_config(&args, &config)?;
    let universe_path = args.universe.clone().unwrap_or(config.universe_file.clone());
    let universe = load_universe(&universe_path)?;

    let store: Arc<dyn BarStore> = if ingest.dry_run {
        Arc::new(DryRunBarStore::new())
    } else {
        let db_path = args.db_path.clone().unwrap_or(config.db_path.clone());
        info!(db_path = %db_path, "opening bar store");
        Arc::new(BarRepository::open(&db_path)?)
    };
    let checkpoints: Arc<dyn CheckpointStore> =
        Arc::new(checkpoint_store(args.checkpoint.clone(), &config, ingest.interval));
    let provider: Arc<dyn BarProvider> = Arc::new(build_chain(&config)?);

    let orchestrator = IngestOrchestrator::new(provider, store, checkpoints, ingest);

    tokio::select! {
        report = orchestrator.run(&universe) => {
            let report = report?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(report.exit_status())
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, the next run resumes after the last saved batch");
            Ok(ExitStatus::Fatal)
        }
    }
}

pub async fn print_fundamentals(ticker: &str, market: Market, config: &Config) -> Result<()> {
    let symbol = Symbol::new(ticker, market)?;
    let chain = build_chain(config)?;
    match chain.fetch_fundamentals(&symbol).await? {
        Some(fundamentals) => println!("{}", serde_json::to_string_pretty(&fundamentals)?),
        None => println!("null"),
    }
    Ok(())
}

pub fn print_checkpoint(store: &FileCheckpointStore) -> Result<()> {
    match store.load() {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => anyhow::bail!("no usable checkpoint at {}", store.path().display()),
    }
    Ok(())
}
