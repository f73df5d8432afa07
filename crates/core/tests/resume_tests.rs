//! Interrupted runs resume at the first unfinished batch and, together,
//! persist the same bars as one uninterrupted run.

mod common;

use std::sync::Arc;
use std::time::Duration;

use boursomatic_core::ingest::{IngestConfig, PacingConfig};
use boursomatic_core::{IngestOrchestrator, RunState};
use boursomatic_market_data::{BarProvider, Interval, ProviderChain, RetryPolicy};

use common::{universe, MemoryBarStore, MemoryCheckpointStore, ScriptedProvider};

const BATCH_SIZE: usize = 2;
const BATCH_DELAY_SECS: u64 = 10;
const TICKERS: [&str; 7] = ["A", "B", "C", "D", "E", "F", "G"];

fn orchestrator(
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryBarStore>,
    checkpoints: Arc<MemoryCheckpointStore>,
) -> IngestOrchestrator {
    let mut config = IngestConfig::for_interval(Interval::Daily);
    config.pacing = PacingConfig::from_secs(BATCH_SIZE, 0.0, BATCH_DELAY_SECS as f64).unwrap();
    let chain: Arc<dyn BarProvider> = Arc::new(ProviderChain::resilient(
        provider,
        None,
        RetryPolicy::no_retry(),
    ));
    IngestOrchestrator::new(chain, store, checkpoints, config)
}

#[tokio::test(start_paused = true)]
async fn resume_after_each_batch_matches_uninterrupted_run() {
    let symbols = universe(&TICKERS);

    let reference = MemoryBarStore::new();
    orchestrator(
        ScriptedProvider::healthy("PRIMARY"),
        reference.clone(),
        MemoryCheckpointStore::new(),
    )
    .run(&symbols)
    .await
    .unwrap();

    let total_batches = TICKERS.len().div_ceil(BATCH_SIZE);
    for completed in 1..total_batches {
        let store = MemoryBarStore::new();
        let checkpoints = MemoryCheckpointStore::new();

        // stop while pausing after batch `completed`
        let cutoff = Duration::from_secs(BATCH_DELAY_SECS * (completed as u64 - 1) + 5);
        let first = orchestrator(
            ScriptedProvider::healthy("PRIMARY"),
            store.clone(),
            checkpoints.clone(),
        );
        let interrupted = tokio::time::timeout(cutoff, first.run(&symbols)).await;
        assert!(interrupted.is_err(), "run should have been cut off");

        let saved = checkpoints.current().unwrap();
        assert_eq!(saved.state, RunState::Running);
        assert_eq!(saved.last_completed_index, Some(completed * BATCH_SIZE - 1));

        let provider = ScriptedProvider::healthy("PRIMARY");
        let report = orchestrator(provider.clone(), store.clone(), checkpoints.clone())
            .run(&symbols)
            .await
            .unwrap();

        let expected_calls: Vec<String> = TICKERS[completed * BATCH_SIZE..]
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(provider.calls(), expected_calls);
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.bars.duplicates, 0);
        assert_eq!(store.keys(), reference.keys());
    }
}

#[tokio::test]
async fn finished_universe_starts_over() {
    let symbols = universe(&["A", "B", "C"]);
    let checkpoints = MemoryCheckpointStore::new();

    let mut config = IngestConfig::for_interval(Interval::Daily);
    config.pacing = PacingConfig::from_secs(2, 0.0, 0.0).unwrap();
    for _ in 0..2 {
        let provider = ScriptedProvider::healthy("PRIMARY");
        let chain: Arc<dyn BarProvider> = Arc::new(ProviderChain::resilient(
            provider.clone(),
            None,
            RetryPolicy::no_retry(),
        ));
        let report = IngestOrchestrator::new(
            chain,
            MemoryBarStore::new(),
            checkpoints.clone(),
            config.clone(),
        )
        .run(&symbols)
        .await
        .unwrap();
        assert_eq!(provider.calls(), vec!["A", "B", "C"]);
        assert_eq!(report.last_completed_index, Some(2));
    }
}

#[tokio::test]
async fn checkpoint_for_other_interval_is_ignored() {
    let symbols = universe(&["A", "B", "C"]);
    let checkpoints = MemoryCheckpointStore::new();

    let mut weekly = IngestConfig::for_interval(Interval::Weekly);
    weekly.pacing = PacingConfig::from_secs(1, 0.0, 0.0).unwrap();
    weekly.max_symbols = Some(2);
    let chain: Arc<dyn BarProvider> = Arc::new(ProviderChain::resilient(
        ScriptedProvider::healthy("PRIMARY"),
        None,
        RetryPolicy::no_retry(),
    ));
    IngestOrchestrator::new(chain, MemoryBarStore::new(), checkpoints.clone(), weekly)
        .run(&symbols)
        .await
        .unwrap();
    assert_eq!(checkpoints.current().unwrap().last_completed_index, Some(1));

    let provider = ScriptedProvider::healthy("PRIMARY");
    let mut daily = IngestConfig::for_interval(Interval::Daily);
    daily.pacing = PacingConfig::from_secs(1, 0.0, 0.0).unwrap();
    let chain: Arc<dyn BarProvider> = Arc::new(ProviderChain::resilient(
        provider.clone(),
        None,
        RetryPolicy::no_retry(),
    ));
    IngestOrchestrator::new(chain, MemoryBarStore::new(), checkpoints.clone(), daily)
        .run(&symbols)
        .await
        .unwrap();
    assert_eq!(provider.calls(), vec!["A", "B", "C"]);
}
