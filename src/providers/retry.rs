//! Retry configuration and the prioritized provider chain.
//!
//! [`ProviderChain`] tries its providers in priority order. One pass over
//! every provider is a *round*; after a failed round the chain waits with
//! exponential backoff and starts over, up to [`RetryConfig::rounds`].
//! Each attempt is bounded by [`RetryConfig::attempt_timeout`].
//!
//! Parsing of the provider output happens inside the attempt, so a
//! malformed payload from one endpoint falls through to the next endpoint
//! exactly like a transport failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use super::traits::ContentProvider;
use crate::clock::duration_millis;
use crate::telemetry;
use crate::types::{Completion, GenerationOptions, Message, Usage};
use crate::{EduBuddyError, Result};

/// Configuration for the bounded retry policy.
///
/// ```rust
/// # use edubuddy::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .rounds(3)
///     .initial_delay(Duration::from_millis(200))
///     .attempt_timeout(Duration::from_secs(10))
///     .jitter(false);
/// assert_eq!(config.delay_for_round(1), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Passes over the provider list. 1 = no retry. Default: 2.
    pub rounds: u32,
    /// Delay before the second round. Default: 1s.
    pub initial_delay: Duration,
    /// Cap on the backoff delay. Default: 10s.
    pub max_delay: Duration,
    /// Whether to add random jitter (up to half the delay). Default: true.
    pub jitter: bool,
    /// Wall-clock bound on a single provider attempt. Default: 30s.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that makes a single pass over the providers.
    pub fn disabled() -> Self {
        Self {
            rounds: 1,
            ..Self::default()
        }
    }

    /// Set the number of rounds.
    pub fn rounds(mut self, n: u32) -> Self {
        self.rounds = n;
        self
    }

    /// Set the delay before the second round.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum backoff delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Set the per-attempt timeout.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Backoff before round `round + 1` (0-indexed): `initial_delay * 2^round`,
    /// capped at `max_delay`. Does NOT include jitter.
    pub fn delay_for_round(&self, round: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(round));
        delay.min(self.max_delay)
    }

    /// Delay actually slept: a provider `retry_after` hint wins over the
    /// computed backoff; jitter is added on top when enabled.
    pub fn effective_delay(&self, round: u32, retry_after: Option<Duration>) -> Duration {
        let base = retry_after.unwrap_or_else(|| self.delay_for_round(round));
        if !self.jitter {
            return base;
        }
        let half = duration_millis(base) / 2;
        base.saturating_add(Duration::from_millis(rand::rng().random_range(0..=half)))
    }
}

/// Providers in priority order, with the bounded retry policy applied.
pub struct ProviderChain {
    providers: Vec<Arc<dyn ContentProvider>>,
    config: RetryConfig,
}

impl ProviderChain {
    /// Create an empty chain.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            providers: Vec::new(),
            config,
        }
    }

    /// Append a provider (lowest priority so far).
    pub fn add(&mut self, provider: Arc<dyn ContentProvider>) {
        self.providers.push(provider);
    }

    /// Builder-style [`add`](Self::add).
    pub fn with(mut self, provider: Arc<dyn ContentProvider>) -> Self {
        self.add(provider);
        self
    }

    /// Provider names in priority order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Invoke providers until one produces output that `parse` accepts.
    ///
    /// Recoverable failures (see [`EduBuddyError::is_recoverable`]) move on
    /// to the next provider; anything else is returned immediately. When
    /// every attempt of every round fails, the last error is returned.
    pub async fn invoke_with<T, F>(
        &self,
        turns: &[Message],
        options: &GenerationOptions,
        parse: F,
    ) -> Result<T>
    where
        F: Fn(Completion) -> Result<T>,
    {
        if self.providers.is_empty() {
            return Err(EduBuddyError::NoProvider);
        }

        let rounds = self.config.rounds.max(1);
        let mut last_err: Option<EduBuddyError> = None;

        for round in 0..rounds {
            if round > 0 {
                let hint = last_err.as_ref().and_then(EduBuddyError::retry_after);
                let delay = self.config.effective_delay(round - 1, hint);
                warn!(
                    round = round + 1,
                    rounds,
                    delay_ms = duration_millis(delay),
                    "all providers failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }

            for (index, provider) in self.providers.iter().enumerate() {
                let name = provider.name();
                let start = Instant::now();
                let outcome = match tokio::time::timeout(
                    self.config.attempt_timeout,
                    provider.invoke(turns, options),
                )
                .await
                {
                    Ok(Ok(completion)) => {
                        if let Some(usage) = &completion.usage {
                            record_token_usage(name, usage);
                        }
                        parse(completion)
                    }
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(EduBuddyError::Timeout(self.config.attempt_timeout)),
                };
                record_attempt(name, start, outcome.is_ok());

                match outcome {
                    Ok(value) => {
                        debug!(provider = name, round = round + 1, "provider attempt succeeded");
                        return Ok(value);
                    }
                    Err(e) if e.is_recoverable() => {
                        let more = round + 1 < rounds || index + 1 < self.providers.len();
                        if more {
                            metrics::counter!(telemetry::RETRIES_TOTAL, "provider" => name.to_owned())
                                .increment(1);
                        }
                        warn!(
                            provider = name,
                            round = round + 1,
                            error = %e,
                            "provider attempt failed"
                        );
                        last_err = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Err(last_err.unwrap_or(EduBuddyError::NoProvider))
    }
}

/// Record attempt outcome metrics (counter + histogram).
fn record_attempt(provider: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::PROVIDER_CALLS_TOTAL,
        "provider" => provider.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::PROVIDER_CALL_DURATION_SECONDS,
        "provider" => provider.to_owned(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record token usage metrics from a completion.
fn record_token_usage(provider: &str, usage: &Usage) {
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider.to_owned(),
        "direction" => "prompt",
    )
    .increment(u64::from(usage.prompt_tokens));
    metrics::counter!(telemetry::TOKENS_TOTAL,
        "provider" => provider.to_owned(),
        "direction" => "completion",
    )
    .increment(u64::from(usage.completion_tokens));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350))
            .jitter(false);
        assert_eq!(config.delay_for_round(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_round(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_round(2), Duration::from_millis(350));
    }

    #[test]
    fn retry_after_hint_wins() {
        let config = RetryConfig::new().jitter(false);
        assert_eq!(
            config.effective_delay(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn oversized_retry_after_hint_saturates() {
        for jitter in [false, true] {
            let config = RetryConfig::new().jitter(jitter);
            assert_eq!(config.effective_delay(0, Some(Duration::MAX)), Duration::MAX);
        }
    }

    #[test]
    fn jitter_stays_within_half_delay() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_millis(100))
            .jitter(true);
        for _ in 0..50 {
            let d = config.effective_delay(0, None);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn empty_chain_reports_no_provider() {
        let chain = ProviderChain::new(RetryConfig::default());
        let result = chain
            .invoke_with(&[], &GenerationOptions::default(), Ok)
            .await;
        assert!(matches!(result, Err(EduBuddyError::NoProvider)));
    }
}
