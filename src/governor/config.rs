//! Rate limit configuration for call governors.

use std::time::Duration;

use serde::Deserialize;

use crate::types::ContentCategory;

/// Per-governor call ceilings and cache lifetime.
///
/// Immutable once a governor is built. Each content category gets its own
/// governor, so categories may use different limits:
///
/// ```rust
/// # use edubuddy::{ContentCategory, RateLimitConfig};
/// let chat = RateLimitConfig::for_category(ContentCategory::Chat);
/// assert_eq!(chat.max_calls_per_minute, 20);
///
/// let custom = RateLimitConfig::new()
///     .max_calls_per_minute(3)
///     .cache_ttl_minutes(1);
/// assert_eq!(custom.max_calls_per_hour, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Calls admitted within any trailing 60 seconds. Default: 5.
    pub max_calls_per_minute: u32,
    /// Calls admitted within any trailing 3600 seconds. Default: 50.
    pub max_calls_per_hour: u32,
    /// Lifetime of cached results, in minutes. Default: 60.
    pub cache_ttl_minutes: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_minute: 5,
            max_calls_per_hour: 50,
            cache_ttl_minutes: 60,
        }
    }
}

impl RateLimitConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default limits for a content category.
    ///
    /// Lessons and games are expensive and long-lived; quizzes are cheaper
    /// and regenerated more often; chat turns are short and rarely repeat.
    pub fn for_category(category: ContentCategory) -> Self {
        match category {
            ContentCategory::Lesson | ContentCategory::Game => Self::default(),
            ContentCategory::Quiz => Self {
                max_calls_per_minute: 10,
                max_calls_per_hour: 100,
                cache_ttl_minutes: 30,
            },
            ContentCategory::Chat => Self {
                max_calls_per_minute: 20,
                max_calls_per_hour: 200,
                cache_ttl_minutes: 5,
            },
        }
    }

    pub fn max_calls_per_minute(mut self, n: u32) -> Self {
        self.max_calls_per_minute = n;
        self
    }

    pub fn max_calls_per_hour(mut self, n: u32) -> Self {
        self.max_calls_per_hour = n;
        self
    }

    pub fn cache_ttl_minutes(mut self, minutes: u64) -> Self {
        self.cache_ttl_minutes = minutes;
        self
    }

    /// Cache lifetime as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes.saturating_mul(60))
    }
}
