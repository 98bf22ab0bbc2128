//! Telemetry metric name constants.
//!
//! Centralised metric names for edubuddy operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `edubuddy_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `category`: content category ("lesson", "quiz", "game", "chat")
//! - `provider`: provider name (e.g. "openai", "proxy")
//! - `source`: where delivered content came from: "fresh", "cached",
//!   "stale" or "fallback"
//! - `status`: outcome: "ok" or "error"

/// Total content requests answered by a governor.
///
/// Labels: `category`, `source`.
pub const REQUESTS_TOTAL: &str = "edubuddy_requests_total";

/// Total provider attempts.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const PROVIDER_CALLS_TOTAL: &str = "edubuddy_provider_calls_total";

/// Provider attempt duration in seconds.
///
/// Labels: `provider`.
pub const PROVIDER_CALL_DURATION_SECONDS: &str = "edubuddy_provider_call_duration_seconds";

/// Total failed provider attempts that were followed by another attempt.
///
/// Labels: `provider`.
pub const RETRIES_TOTAL: &str = "edubuddy_retries_total";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "edubuddy_tokens_total";

/// Total result cache hits.
///
/// Labels: `category`, `tier` ("memory" | "persistent").
pub const CACHE_HITS_TOTAL: &str = "edubuddy_cache_hits_total";

/// Total result cache misses.
///
/// Labels: `category`.
pub const CACHE_MISSES_TOTAL: &str = "edubuddy_cache_misses_total";

/// Total requests denied by the call ledger.
///
/// Labels: `category`.
pub const THROTTLED_TOTAL: &str = "edubuddy_throttled_total";

/// Total swallowed persistent-store write failures.
///
/// Labels: `category`.
pub const STORAGE_WRITE_FAILURES_TOTAL: &str = "edubuddy_storage_write_failures_total";
