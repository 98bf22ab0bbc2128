//! Tests for the prioritized provider chain and its bounded retry policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use edubuddy::{
    Completion, ContentProvider, EduBuddyError, GenerationOptions, Message, ProviderChain,
    Result, RetryConfig,
};

/// Mock provider that always returns a specific error.
struct AlwaysFailProvider {
    name: &'static str,
    error: fn() -> EduBuddyError,
    call_count: AtomicU32,
}

impl AlwaysFailProvider {
    fn new(name: &'static str, error: fn() -> EduBuddyError) -> Arc<Self> {
        Arc::new(Self {
            name,
            error,
            call_count: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentProvider for AlwaysFailProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, _turns: &[Message], _options: &GenerationOptions) -> Result<Completion> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Err((self.error)())
    }
}

/// Mock provider that always succeeds with its own name as content.
struct SuccessProvider {
    name: &'static str,
    call_count: AtomicU32,
}

impl SuccessProvider {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            call_count: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentProvider for SuccessProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn invoke(&self, _turns: &[Message], _options: &GenerationOptions) -> Result<Completion> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(Completion {
            content: self.name.to_string(),
            model: None,
            usage: None,
        })
    }
}

/// Mock provider that never answers.
struct HangingProvider;

#[async_trait]
impl ContentProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn invoke(&self, _turns: &[Message], _options: &GenerationOptions) -> Result<Completion> {
        std::future::pending().await
    }
}

fn server_error() -> EduBuddyError {
    EduBuddyError::Api {
        status: 500,
        message: "boom".to_string(),
    }
}

fn no_jitter() -> RetryConfig {
    RetryConfig::new()
        .initial_delay(Duration::from_secs(1))
        .jitter(false)
}

async fn content(chain: &ProviderChain) -> Result<String> {
    chain
        .invoke_with(&[Message::user("hi")], &GenerationOptions::default(), |c| {
            Ok(c.content)
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn primary_success_skips_fallbacks() {
    let primary = SuccessProvider::new("primary");
    let secondary = SuccessProvider::new("secondary");
    let chain = ProviderChain::new(no_jitter())
        .with(primary.clone())
        .with(secondary.clone());

    assert_eq!(content(&chain).await.unwrap(), "primary");
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn failing_primary_falls_through_in_order() {
    let primary = AlwaysFailProvider::new("primary", server_error);
    let secondary = SuccessProvider::new("secondary");
    let chain = ProviderChain::new(no_jitter())
        .with(primary.clone())
        .with(secondary.clone());

    let start = Instant::now();
    assert_eq!(content(&chain).await.unwrap(), "secondary");
    assert_eq!(primary.calls(), 1);
    // No backoff within a round.
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rounds_return_last_error_after_backoff() {
    let primary = AlwaysFailProvider::new("primary", server_error);
    let secondary = AlwaysFailProvider::new("secondary", || EduBuddyError::Timeout(
        Duration::from_secs(30),
    ));
    let chain = ProviderChain::new(no_jitter().rounds(2))
        .with(primary.clone())
        .with(secondary.clone());

    let start = Instant::now();
    let err = content(&chain).await.unwrap_err();

    assert!(matches!(err, EduBuddyError::Timeout(_)));
    assert_eq!(primary.calls(), 2);
    assert_eq!(secondary.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn non_recoverable_error_stops_immediately() {
    let primary = AlwaysFailProvider::new("primary", || {
        EduBuddyError::InvalidInput("bad".to_string())
    });
    let secondary = SuccessProvider::new("secondary");
    let chain = ProviderChain::new(no_jitter())
        .with(primary.clone())
        .with(secondary.clone());

    let err = content(&chain).await.unwrap_err();
    assert!(matches!(err, EduBuddyError::InvalidInput(_)));
    assert_eq!(secondary.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_attempt_times_out() {
    let backup = SuccessProvider::new("backup");
    let chain = ProviderChain::new(
        no_jitter()
            .rounds(1)
            .attempt_timeout(Duration::from_secs(2)),
    )
    .with(Arc::new(HangingProvider))
    .with(backup.clone());

    let start = Instant::now();
    assert_eq!(content(&chain).await.unwrap(), "backup");
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn parse_failure_falls_through_like_a_transport_error() {
    let primary = SuccessProvider::new("garbage");
    let secondary = SuccessProvider::new("good");
    let chain = ProviderChain::new(no_jitter())
        .with(primary.clone())
        .with(secondary.clone());

    let result = chain
        .invoke_with(&[], &GenerationOptions::default(), |c| {
            if c.content == "good" {
                Ok(c.content)
            } else {
                Err(EduBuddyError::MalformedResponse("not good".to_string()))
            }
        })
        .await;

    assert_eq!(result.unwrap(), "good");
    assert_eq!(primary.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn provider_retry_after_hint_sets_the_backoff() {
    let limited = AlwaysFailProvider::new("limited", || EduBuddyError::RateLimited {
        retry_after: Some(Duration::from_secs(7)),
    });
    let chain = ProviderChain::new(no_jitter().rounds(2)).with(limited.clone());

    let start = Instant::now();
    assert!(content(&chain).await.is_err());
    assert_eq!(limited.calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(7));
}

#[test]
fn chain_reports_names_in_priority_order() {
    let chain = ProviderChain::new(RetryConfig::default())
        .with(SuccessProvider::new("a"))
        .with(SuccessProvider::new("b"));
    assert_eq!(chain.names(), vec!["a", "b"]);
    assert!(!chain.is_empty());
}
