//! Builder for configuring gateway instances

use std::collections::HashMap;
use std::sync::Arc;

use super::EduBuddy;
use crate::cache::{CacheConfig, LocalStore, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::governor::{CallGovernor, RateLimitConfig};
use crate::providers::{ContentProvider, OpenAiClient, ProviderChain, RetryConfig};
use crate::types::{ContentCategory, GenerationOptions};
use crate::{EduBuddyError, Result};

/// Builder for [`EduBuddy`].
///
/// Providers are tried in the order they are added.
pub struct EduBuddyBuilder {
    providers: Vec<Arc<dyn ContentProvider>>,
    limits: HashMap<ContentCategory, RateLimitConfig>,
    retry: RetryConfig,
    cache: CacheConfig,
    store: Option<Arc<dyn LocalStore>>,
    clock: Option<Arc<dyn Clock>>,
    generation: GenerationOptions,
    static_fallback: bool,
}

impl std::fmt::Debug for EduBuddyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EduBuddyBuilder")
            .field("providers", &self.providers.len())
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("store", &self.store.is_some())
            .field("clock", &self.clock.is_some())
            .field("generation", &self.generation)
            .field("static_fallback", &self.static_fallback)
            .finish()
    }
}

impl EduBuddyBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            limits: HashMap::new(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            store: None,
            clock: None,
            generation: GenerationOptions::default(),
            static_fallback: true,
        }
    }

    /// Add the public OpenAI API as the next provider.
    pub fn openai(self, api_key: impl Into<String>) -> Self {
        self.provider(Arc::new(OpenAiClient::new(api_key)))
    }

    /// Add an OpenAI-compatible endpoint at `base_url` as the next provider.
    pub fn openai_compatible(
        self,
        name: impl Into<String>,
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
    ) -> Self {
        self.provider(Arc::new(
            OpenAiClient::with_base_url(api_key, base_url).named(name),
        ))
    }

    /// Add a key-holding proxy endpoint as the next provider.
    pub fn proxy(self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.provider(Arc::new(OpenAiClient::proxy(name, url)))
    }

    /// Add a custom provider as the next provider.
    pub fn provider(mut self, provider: Arc<dyn ContentProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Override the rate limits for one category.
    pub fn limits(mut self, category: ContentCategory, config: RateLimitConfig) -> Self {
        self.limits.insert(category, config);
        self
    }

    /// Set the provider retry policy.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Set the result cache configuration.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Persistent store mirrored by the result caches.
    ///
    /// Without a store, results live in memory only.
    pub fn store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Time source for the ledgers and caches (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Base generation options (model, output bound, temperature).
    pub fn generation(mut self, options: GenerationOptions) -> Self {
        self.generation = options;
        self
    }

    /// Serve static fallback content when nothing is cached (default: true).
    ///
    /// When disabled, a denied call with an empty cache is rejected with
    /// [`EduBuddyError::Throttled`].
    pub fn static_fallback(mut self, enabled: bool) -> Self {
        self.static_fallback = enabled;
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<EduBuddy> {
        if self.providers.is_empty() {
            return Err(EduBuddyError::NoProvider);
        }

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let chain = Arc::new(
            self.providers
                .into_iter()
                .fold(ProviderChain::new(self.retry), ProviderChain::with),
        );

        let governor = |category: ContentCategory| {
            let limits = self
                .limits
                .get(&category)
                .cloned()
                .unwrap_or_else(|| RateLimitConfig::for_category(category));
            let cache = ResultCache::new(
                category.as_str(),
                &self.cache,
                self.store.clone(),
                Arc::clone(&clock),
            );
            CallGovernor::new(category, limits, Arc::clone(&chain), cache, Arc::clone(&clock))
                .with_generation(self.generation.clone())
                .with_static_fallback(self.static_fallback)
        };

        let lesson = governor(ContentCategory::Lesson);
        let quiz = governor(ContentCategory::Quiz);
        let game = governor(ContentCategory::Game);
        let chat = governor(ContentCategory::Chat);

        Ok(EduBuddy {
            lesson,
            quiz,
            game,
            chat,
            chain,
        })
    }
}

impl Default for EduBuddyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
