//! Call governor: cache, rate limiting and fallback around provider calls.
//!
//! One [`CallGovernor`] exists per content category. For each request it
//!
//! 1. serves a valid cached result if there is one,
//! 2. asks the [`CallLedger`] whether another call fits under the ceilings,
//! 3. if it does, invokes the [`ProviderChain`], normalizes the output,
//!    caches it and records the call,
//! 4. if it does not, serves cached content, then static fallback content,
//!    and only then rejects with [`EduBuddyError::Throttled`].
//!
//! Provider failures that survive the chain's retry policy are recovered
//! the same way as a denial: cache first, then static fallback.
//!
//! Concurrent requests for the same fingerprint are single-flighted: one
//! leader performs the call while followers wait and then read the cache.
//!
//! The provider call runs on a spawned task. A caller that stops waiting
//! does not cancel it: the result is still cached and the call recorded.

pub mod config;
pub mod ledger;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, instrument, warn};

pub use config::RateLimitConfig;
pub use ledger::{CallLedger, LedgerUsage};

use crate::cache::ResultCache;
use crate::clock::Clock;
use crate::content::{build_turns, fallback_content, generation_options, normalize};
use crate::fingerprint::{fingerprint, is_degraded};
use crate::providers::ProviderChain;
use crate::telemetry;
use crate::types::{
    CanonicalContent, ContentCategory, ContentRequest, GenerationOptions, Message,
};
use crate::{EduBuddyError, Result};

/// Where delivered content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    /// Generated by a provider for this request.
    Fresh,
    /// Served from the cache without consulting the ledger.
    Cached,
    /// Served from the cache after a denial or a failed call.
    Stale,
    /// Static fallback content.
    Fallback,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Cached => "cached",
            Self::Stale => "stale",
            Self::Fallback => "fallback",
        }
    }
}

/// Content handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentResponse {
    pub content: CanonicalContent,
    pub source: ContentSource,
    pub fingerprint: String,
}

/// Descriptor fingerprinted for caching: the semantic request plus the
/// resolved model and output bound.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor<'a> {
    request: &'a ContentRequest,
    model: &'a str,
    max_tokens: Option<usize>,
}

/// Per-fingerprint single-flight locks.
#[derive(Default)]
struct InFlight {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InFlight {
    /// Wait for the lock on `fingerprint`. Returns the guard and whether
    /// another request held it first.
    async fn acquire(&self, fingerprint: &str) -> (OwnedMutexGuard<()>, bool) {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(fingerprint.to_string()).or_default())
        };
        match Arc::clone(&lock).try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => (lock.lock_owned().await, true),
        }
    }

    /// Drop the lock entry once nobody else holds or waits on it.
    fn release(&self, fingerprint: &str, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(fingerprint)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(fingerprint);
        }
    }
}

/// Rate-limited, caching front for one content category.
pub struct CallGovernor {
    category: ContentCategory,
    limits: RateLimitConfig,
    ledger: Arc<CallLedger>,
    cache: Arc<ResultCache<CanonicalContent>>,
    chain: Arc<ProviderChain>,
    generation: GenerationOptions,
    static_fallback: bool,
    in_flight: Arc<InFlight>,
}

impl CallGovernor {
    pub fn new(
        category: ContentCategory,
        limits: RateLimitConfig,
        chain: Arc<ProviderChain>,
        cache: ResultCache<CanonicalContent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            category,
            ledger: Arc::new(CallLedger::new(&limits, clock)),
            limits,
            cache: Arc::new(cache),
            chain,
            generation: GenerationOptions::default(),
            static_fallback: true,
            in_flight: Arc::default(),
        }
    }

    /// Base generation options; request-level model and token bound win.
    pub fn with_generation(mut self, options: GenerationOptions) -> Self {
        self.generation = options;
        self
    }

    /// Whether to serve static fallback content when nothing is cached.
    pub fn with_static_fallback(mut self, enabled: bool) -> Self {
        self.static_fallback = enabled;
        self
    }

    pub fn category(&self) -> ContentCategory {
        self.category
    }

    pub fn limits(&self) -> &RateLimitConfig {
        &self.limits
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &ResultCache<CanonicalContent> {
        &self.cache
    }

    /// Fingerprint `request` would be cached under.
    pub fn fingerprint_for(&self, request: &ContentRequest) -> String {
        let options = generation_options(self.category, request, &self.generation);
        fingerprint(&Descriptor {
            request,
            model: &options.model,
            max_tokens: options.max_tokens,
        })
    }

    /// Deliver content for `request`.
    ///
    /// Only [`EduBuddyError::Throttled`], invalid input, and provider
    /// failures with neither cached nor fallback content propagate.
    #[instrument(skip_all, fields(category = %self.category))]
    pub async fn request(&self, request: &ContentRequest) -> Result<ContentResponse> {
        let turns = build_turns(self.category, request)?;
        let options = generation_options(self.category, request, &self.generation);
        let fp = fingerprint(&Descriptor {
            request,
            model: &options.model,
            max_tokens: options.max_tokens,
        });

        if !request.skip_cache
            && let Some(content) = self.cache.get(&fp)
        {
            debug!("serving cached content");
            return Ok(self.respond(content, ContentSource::Cached, fp));
        }

        let flight = if is_degraded(&fp) {
            None
        } else {
            let (guard, waited) = self.in_flight.acquire(&fp).await;
            if waited
                && !request.skip_cache
                && let Some(content) = self.cache.get(&fp)
            {
                debug!("served by concurrent request");
                self.in_flight.release(&fp, guard);
                return Ok(self.respond(content, ContentSource::Cached, fp));
            }
            Some(guard)
        };

        if !self.ledger.can_make_call() {
            if let Some(guard) = flight {
                self.in_flight.release(&fp, guard);
            }
            let usage = self.ledger.usage();
            debug!(
                last_minute = usage.last_minute,
                last_hour = usage.last_hour,
                "call denied by ledger"
            );
            metrics::counter!(telemetry::THROTTLED_TOTAL, "category" => self.category.as_str())
                .increment(1);
            let (content, source) = self.recover(request, &fp).ok_or_else(|| {
                EduBuddyError::Throttled {
                    retry_after: self.ledger.retry_after(),
                }
            })?;
            return Ok(self.respond(content, source, fp));
        }

        let generated = match self
            .spawn_call(request, turns, options, fp.clone(), flight)
            .await
        {
            Ok(result) => result,
            Err(e) => Err(EduBuddyError::Internal(format!("generation task failed: {e}"))),
        };

        match generated {
            Ok(content) => Ok(self.respond(content, ContentSource::Fresh, fp)),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "generation failed, falling back");
                let (content, source) = self.recover(request, &fp).ok_or(e)?;
                Ok(self.respond(content, source, fp))
            }
            Err(e) => Err(e),
        }
    }

    /// Run provider call, cache write and ledger record on a detached task.
    ///
    /// The task completes even if the caller stops waiting; the result then
    /// still lands in the cache for later requests. The single-flight guard
    /// is released by the task.
    fn spawn_call(
        &self,
        request: &ContentRequest,
        turns: Vec<Message>,
        options: GenerationOptions,
        fp: String,
        flight: Option<OwnedMutexGuard<()>>,
    ) -> JoinHandle<Result<CanonicalContent>> {
        let category = self.category;
        let ttl = self.limits.cache_ttl();
        let request = request.clone();
        let chain = Arc::clone(&self.chain);
        let cache = Arc::clone(&self.cache);
        let ledger = Arc::clone(&self.ledger);
        let in_flight = Arc::clone(&self.in_flight);

        let task = async move {
            let result = chain
                .invoke_with(&turns, &options, |completion| {
                    normalize(category, &completion.content, &request)
                })
                .await;

            if let Ok(content) = &result {
                if is_degraded(&fp) {
                    warn!("degraded fingerprint, result not cached");
                } else {
                    cache.put(&fp, content.clone(), ttl);
                }
                ledger.record_call();
                info!(model = %options.model, "generated fresh content");
            }
            if let Some(guard) = flight {
                in_flight.release(&fp, guard);
            }
            result
        };
        tokio::spawn(task.instrument(Span::current()))
    }

    /// Cached content regardless of `skip_cache`, else static fallback.
    fn recover(
        &self,
        request: &ContentRequest,
        fp: &str,
    ) -> Option<(CanonicalContent, ContentSource)> {
        if let Some(content) = self.cache.get(fp) {
            return Some((content, ContentSource::Stale));
        }
        if self.static_fallback {
            warn!("serving static fallback content");
            return Some((
                fallback_content(self.category, request),
                ContentSource::Fallback,
            ));
        }
        None
    }

    fn respond(
        &self,
        content: CanonicalContent,
        source: ContentSource,
        fingerprint: String,
    ) -> ContentResponse {
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "category" => self.category.as_str(),
            "source" => source.as_str(),
        )
        .increment(1);
        ContentResponse {
            content,
            source,
            fingerprint,
        }
    }
}
