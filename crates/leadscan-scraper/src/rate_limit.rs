//! Request pacing, throttling cooldowns and retry policy shared by every
//! source adapter.
//!
//! [`RateController`] is constructed once per scan and handed to adapters by
//! reference. It owns the only mutable state shared between sources: the
//! per-source cooldown that a throttling signal arms for the next wait.
//! Adapters report throttling through [`RateController::on_throttled`] and
//! never touch that state directly.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use leadscan_core::{ScanConfig, Source, DEFAULT_USER_AGENTS};
use rand::Rng;

use crate::error::{FailureKind, ScraperError};

/// Inclusive range a randomized delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Builds a range from millisecond bounds; an inverted pair collapses to `min`.
    #[must_use]
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
        }
    }

    /// Draws a uniformly distributed delay from the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        // Millisecond resolution is plenty for politeness delays.
        #[allow(clippy::cast_possible_truncation)]
        let (min_ms, max_ms) = (self.min.as_millis() as u64, self.max.as_millis() as u64);
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

/// Tunables for [`RateController`].
#[derive(Debug, Clone)]
pub struct RateSettings {
    /// Delay before every listing request.
    pub request_delay: DelayRange,
    /// Extra delay between result pages of one source.
    pub page_delay: DelayRange,
    /// Wait forced after a throttling signal.
    pub cooldown: Duration,
    /// Upper bound applied to `cooldown`.
    pub max_cooldown: Duration,
    /// Client identities (User-Agent strings) rotated round-robin.
    pub identities: Vec<String>,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            request_delay: DelayRange::from_millis(2_000, 5_000),
            page_delay: DelayRange::from_millis(3_000, 6_000),
            cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(120),
            identities: DEFAULT_USER_AGENTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl RateSettings {
    #[must_use]
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            request_delay: DelayRange::from_millis(
                config.request_delay_min_ms,
                config.request_delay_max_ms,
            ),
            page_delay: DelayRange::from_millis(config.page_delay_min_ms, config.page_delay_max_ms),
            cooldown: Duration::from_secs(config.throttle_cooldown_secs),
            max_cooldown: Duration::from_secs(config.max_cooldown_secs),
            identities: config.user_agents.clone(),
        }
    }
}

/// Throttling state tracked for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceRateState {
    /// Cooldown the next wait for this source will use instead of the normal delay.
    pub pending_cooldown: Option<Duration>,
    /// Throttling signals received from this source so far.
    pub throttle_events: u32,
}

pub struct RateController {
    settings: RateSettings,
    next_identity: AtomicUsize,
    throttle_events: AtomicU32,
    sources: Mutex<HashMap<Source, SourceRateState>>,
}

impl RateController {
    #[must_use]
    pub fn new(settings: RateSettings) -> Self {
        Self {
            settings,
            next_identity: AtomicUsize::new(0),
            throttle_events: AtomicU32::new(0),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Sleeps before the next request to `source`.
    ///
    /// Uses the armed cooldown if `source` was throttled since its last wait,
    /// otherwise a random delay from the request range.
    pub async fn wait_before_request(&self, source: Source) {
        let delay = self.next_request_delay(source);
        if !delay.is_zero() {
            tracing::debug!(%source, delay_ms = delay.as_millis(), "waiting before request");
            tokio::time::sleep(delay).await;
        }
    }

    /// Sleeps between two result pages of `source`.
    pub async fn wait_page_transition(&self, source: Source) {
        let delay = self
            .take_cooldown(source)
            .unwrap_or_else(|| self.settings.page_delay.sample());
        if !delay.is_zero() {
            tracing::debug!(%source, delay_ms = delay.as_millis(), "waiting before next page");
            tokio::time::sleep(delay).await;
        }
    }

    /// Records a throttling signal from `source` and arms its cooldown.
    pub fn on_throttled(&self, source: Source) {
        let cooldown = self.settings.cooldown.min(self.settings.max_cooldown);
        let total = self.throttle_events.fetch_add(1, Ordering::Relaxed) + 1;
        let mut sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        let state = sources.entry(source).or_default();
        state.pending_cooldown = Some(cooldown);
        state.throttle_events += 1;
        tracing::warn!(
            %source,
            cooldown_secs = cooldown.as_secs(),
            source_events = state.throttle_events,
            total_events = total,
            "throttling encountered"
        );
    }

    /// Returns the next client identity, cycling through the configured pool.
    #[must_use]
    pub fn rotate_identity(&self) -> &str {
        if self.settings.identities.is_empty() {
            return DEFAULT_USER_AGENTS[0];
        }
        let idx = self.next_identity.fetch_add(1, Ordering::Relaxed);
        &self.settings.identities[idx % self.settings.identities.len()]
    }

    /// Total throttling signals received across all sources.
    #[must_use]
    pub fn throttle_events(&self) -> u32 {
        self.throttle_events.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn source_state(&self, source: Source) -> SourceRateState {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .copied()
            .unwrap_or_default()
    }

    fn next_request_delay(&self, source: Source) -> Duration {
        self.take_cooldown(source)
            .unwrap_or_else(|| self.settings.request_delay.sample())
    }

    fn take_cooldown(&self, source: Source) -> Option<Duration> {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&source)
            .and_then(|state| state.pending_cooldown.take())
    }
}

/// Retry bounds for one logical request to a source.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after transient failures.
    pub max_retries: u32,
    /// Linear backoff step: the n-th retry waits `backoff_step * n`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_step: Duration::from_secs(1),
        }
    }
}

/// Executes `operation` against `source`, retrying according to the failure kind.
///
/// | Kind | Reaction |
/// |------|----------|
/// | [`FailureKind::Transient`] | linear backoff, up to `max_retries` retries |
/// | [`FailureKind::Throttled`] | `on_throttled`, wait out the cooldown, one more try |
/// | anything else | returned immediately |
///
/// When retries run out the last error is returned.
pub(crate) async fn retry_source_request<T, F, Fut>(
    rate: &RateController,
    source: Source,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut transient_retries = 0u32;
    let mut throttle_retried = false;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.kind() {
            FailureKind::Transient if transient_retries < policy.max_retries => {
                transient_retries += 1;
                let delay = policy.backoff_step.saturating_mul(transient_retries);
                tracing::warn!(
                    %source,
                    attempt = transient_retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "transient source error, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            FailureKind::Throttled if !throttle_retried => {
                throttle_retried = true;
                rate.on_throttled(source);
                rate.wait_before_request(source).await;
            }
            _ => return Err(err),
        }
    }
}
