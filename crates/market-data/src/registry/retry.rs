//! Retry with exponential backoff around a single provider.
//!
//! [`ResilientProvider`] wraps any [`BarProvider`] and exposes the same trait.
//! Transient per-symbol failures are re-requested (only those symbols) after
//! a `tokio::time::sleep`, up to the policy's attempt budget. Whatever is
//! still failing afterwards is reported as a permanent failure carrying the
//! last cause and the number of attempts made.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{FailureCause, FetchOutcome, FetchWindow, Fundamentals, Symbol};
use crate::provider::{BarProvider, ProviderCapabilities};

/// Default number of attempts per symbol (first call included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Exponential backoff policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<Self, MarketDataError> {
        if max_attempts == 0 {
            return Err(MarketDataError::InvalidRequest(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(MarketDataError::InvalidRequest(format!(
                "max_delay ({:?}) cannot be below base_delay ({:?})",
                max_delay, base_delay
            )));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
        })
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one.
    ///
    /// `base * 2^(failed_attempt - 1)`, capped at `max_delay`.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// A provider wrapped with retry/backoff.
pub struct ResilientProvider {
    inner: Arc<dyn BarProvider>,
    policy: RetryPolicy,
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn BarProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn backoff(&self, failed_attempt: u32, pending: usize) {
        let delay = self.policy.delay_after(failed_attempt);
        warn!(
            "{}: {} symbol(s) failed transiently on attempt {}/{}, retrying in {:?}",
            self.inner.id(),
            pending,
            failed_attempt,
            self.policy.max_attempts,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

fn exhausted(mut cause: FailureCause, attempts: u32) -> FetchOutcome {
    cause.attempts = attempts;
    FetchOutcome::PermanentFailure(cause)
}

#[async_trait]
impl BarProvider for ResilientProvider {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        self.inner.normalize_symbol(symbol)
    }

    async fn fetch_bars(
        &self,
        symbols: &[Symbol],
        window: &FetchWindow,
    ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
        let provider = self.inner.id();
        let max_attempts = self.policy.max_attempts;

        let mut outcomes = HashMap::with_capacity(symbols.len());
        let mut pending: Vec<Symbol> = symbols.to_vec();
        let mut attempt = 0;

        while !pending.is_empty() {
            attempt += 1;
            let last_attempt = attempt >= max_attempts;

            match self.inner.fetch_bars(&pending, window).await {
                Ok(mut results) => {
                    let mut retry = Vec::new();
                    for symbol in pending.drain(..) {
                        let outcome = results.remove(&symbol).unwrap_or_else(|| {
                            let error = MarketDataError::MalformedResponse {
                                provider: provider.to_string(),
                                message: format!("no outcome returned for {}", symbol),
                            };
                            FetchOutcome::from_error(provider, &error, attempt)
                        });
                        match outcome {
                            FetchOutcome::TransientFailure(_) if !last_attempt => {
                                retry.push(symbol);
                            }
                            FetchOutcome::TransientFailure(cause)
                            | FetchOutcome::PermanentFailure(cause) => {
                                outcomes.insert(symbol, exhausted(cause, attempt));
                            }
                            other => {
                                outcomes.insert(symbol, other);
                            }
                        }
                    }
                    pending = retry;
                }
                Err(e) if attempt == 1 && !e.retry_class().is_transient() => {
                    return Err(e);
                }
                Err(e) if e.retry_class().is_transient() && !last_attempt => {
                    debug!("{}: whole request failed transiently: {}", provider, e);
                }
                Err(e) => {
                    for symbol in pending.drain(..) {
                        let cause = FailureCause::from_error(provider, &e, attempt);
                        outcomes.insert(symbol, FetchOutcome::PermanentFailure(cause));
                    }
                }
            }

            if !pending.is_empty() {
                self.backoff(attempt, pending.len()).await;
            }
        }

        Ok(outcomes)
    }

    async fn fetch_fundamentals(
        &self,
        symbol: &Symbol,
    ) -> Result<Option<Fundamentals>, MarketDataError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.fetch_fundamentals(symbol).await {
                Err(e) if e.retry_class().is_transient() && attempt < self.policy.max_attempts => {
                    self.backoff(attempt, 1).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::models::{Bar, Interval, Market};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted per-symbol outcomes, recording each request.
    struct ScriptedProvider {
        script: Mutex<HashMap<Symbol, VecDeque<FetchOutcome>>>,
        calls: Mutex<Vec<Vec<Symbol>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<(Symbol, Vec<FetchOutcome>)>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|(s, o)| (s, o.into_iter().collect()))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<Symbol>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BarProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            "SCRIPTED"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                intervals: Interval::ALL,
                markets: Market::ALL,
                supports_fundamentals: false,
            }
        }

        fn normalize_symbol(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
            Ok(symbol.ticker().to_string())
        }

        async fn fetch_bars(
            &self,
            symbols: &[Symbol],
            _window: &FetchWindow,
        ) -> Result<HashMap<Symbol, FetchOutcome>, MarketDataError> {
            self.calls.lock().unwrap().push(symbols.to_vec());
            let mut script = self.script.lock().unwrap();
            Ok(symbols
                .iter()
                .map(|s| {
                    let outcome = script
                        .get_mut(s)
                        .and_then(|q| q.pop_front())
                        .unwrap_or(FetchOutcome::Empty);
                    (s.clone(), outcome)
                })
                .collect())
        }
    }

    fn sym(t: &str) -> Symbol {
        Symbol::new(t, Market::Nasdaq).unwrap()
    }

    fn window() -> FetchWindow {
        let end = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        FetchWindow::lookback_days(10, Interval::Daily, end).unwrap()
    }

    fn bars(symbol: &Symbol) -> Vec<Bar> {
        vec![Bar {
            symbol: symbol.clone(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            interval: Interval::Daily,
            open: dec!(10),
            high: dec!(11),
            low: dec!(9),
            close: dec!(10.5),
            volume: dec!(100),
            source: "SCRIPTED".to_string(),
        }]
    }

    fn throttled() -> FetchOutcome {
        FetchOutcome::from_error(
            "SCRIPTED",
            &MarketDataError::RateLimited {
                provider: "SCRIPTED".to_string(),
            },
            1,
        )
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
        assert_eq!(policy.delay_after(40), Duration::from_secs(10));
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(2)).is_err());
        assert!(RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(2)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Backoff never shrinks between retries and never exceeds the cap.
        #[test]
        fn prop_backoff_is_monotonic_and_capped(
            base_ms in 0u64..5_000,
            extra_ms in 0u64..60_000,
            attempt in 1u32..64,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = Duration::from_millis(base_ms + extra_ms);
            let policy = RetryPolicy::new(5, base, max).unwrap();

            let current = policy.delay_after(attempt);
            let next = policy.delay_after(attempt + 1);
            prop_assert!(next >= current);
            prop_assert!(current <= max);
            prop_assert!(policy.delay_after(1) == base.min(max));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_transient_symbols_are_retried() {
        let (a, b) = (sym("AAA"), sym("BBB"));
        let inner = Arc::new(ScriptedProvider::new(vec![
            (a.clone(), vec![FetchOutcome::Success(bars(&a))]),
            (
                b.clone(),
                vec![throttled(), FetchOutcome::Success(bars(&b))],
            ),
        ]));
        let provider = ResilientProvider::new(inner.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let outcomes = provider.fetch_bars(&[a.clone(), b.clone()], &window()).await.unwrap();

        assert!(matches!(outcomes[&a], FetchOutcome::Success(_)));
        assert!(matches!(outcomes[&b], FetchOutcome::Success(_)));
        assert_eq!(inner.calls(), vec![vec![a, b.clone()], vec![b]]);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_becomes_permanent_with_attempt_count() {
        let a = sym("AAA");
        let inner = Arc::new(ScriptedProvider::new(vec![(
            a.clone(),
            vec![throttled(), throttled(), throttled(), throttled()],
        )]));
        let provider = ResilientProvider::new(inner.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let outcomes = provider.fetch_bars(&[a.clone()], &window()).await.unwrap();

        match &outcomes[&a] {
            FetchOutcome::PermanentFailure(cause) => {
                assert_eq!(cause.attempts, 3);
                assert_eq!(cause.kind, FailureKind::RateLimited);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(inner.calls().len(), 3);
        // 2s + 4s between the three attempts
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let a = sym("AAA");
        let not_found = FetchOutcome::from_error(
            "SCRIPTED",
            &MarketDataError::SymbolNotFound("AAA".to_string()),
            1,
        );
        let inner = Arc::new(ScriptedProvider::new(vec![(a.clone(), vec![not_found])]));
        let provider = ResilientProvider::new(inner.clone(), RetryPolicy::default());

        let outcomes = provider.fetch_bars(&[a.clone()], &window()).await.unwrap();
        assert!(matches!(outcomes[&a], FetchOutcome::PermanentFailure(_)));
        assert_eq!(inner.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retry_policy_makes_single_attempt() {
        let a = sym("AAA");
        let inner = Arc::new(ScriptedProvider::new(vec![(a.clone(), vec![throttled()])]));
        let provider = ResilientProvider::new(inner.clone(), RetryPolicy::no_retry());

        let outcomes = provider.fetch_bars(&[a.clone()], &window()).await.unwrap();
        assert_eq!(outcomes[&a].failure_cause().unwrap().attempts, 1);
        assert_eq!(inner.calls().len(), 1);
    }
}
