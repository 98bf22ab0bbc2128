//! Configuration loading for the `edubuddy` CLI.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.edubuddy/config.toml` (user)
//! 3. `/etc/edubuddy/config.toml` (system)
//!
//! With no file present, built-in defaults apply. Secrets are loaded
//! separately with mandatory permission checks:
//! 1. `~/.edubuddy/secrets.toml` (user, must be 0600)
//! 2. `/etc/edubuddy/secrets.toml` (system, must be 0600)
//!
//! ```toml
//! static_fallback = true
//!
//! [generation]
//! model = "gpt-4o-mini"
//!
//! [limits.quiz]
//! max_calls_per_minute = 4
//!
//! [[providers]]
//! name = "edge"
//! kind = "proxy"
//! url = "https://example.org/functions/v1/generate"
//!
//! [[providers]]
//! name = "openai"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheConfig, FileStore, default_store_path};
use crate::clock::duration_millis;
use crate::gateway::EduBuddyBuilder;
use crate::governor::RateLimitConfig;
use crate::providers::RetryConfig;
use crate::providers::openai::DEFAULT_BASE_URL;
use crate::types::{ContentCategory, DEFAULT_MODEL, GenerationOptions};
use crate::{EduBuddy, EduBuddyError, Result};

/// CLI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Serve static fallback content when nothing is cached (default: true).
    #[serde(default = "default_true")]
    pub static_fallback: bool,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    /// Per-category overrides of the built-in rate limits, keyed by
    /// category name.
    #[serde(default)]
    pub limits: HashMap<String, LimitsOverride>,
    /// Providers in priority order. Empty means "openai".
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            static_fallback: true,
            generation: GenerationConfig::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            limits: HashMap::new(),
            providers: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Base generation options.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: None,
            temperature: None,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Retry policy, in plain integer units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub rounds: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            rounds: defaults.rounds,
            initial_delay_ms: duration_millis(defaults.initial_delay),
            max_delay_ms: duration_millis(defaults.max_delay),
            jitter: defaults.jitter,
            attempt_timeout_secs: defaults.attempt_timeout.as_secs(),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        RetryConfig::new()
            .rounds(s.rounds)
            .initial_delay(Duration::from_millis(s.initial_delay_ms))
            .max_delay(Duration::from_millis(s.max_delay_ms))
            .jitter(s.jitter)
            .attempt_timeout(Duration::from_secs(s.attempt_timeout_secs))
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Mirror results into a file store (default: true).
    #[serde(default = "default_true")]
    pub persistent: bool,
    /// Store file (default: `<cache_dir>/edubuddy/store.json`).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            persistent: true,
            path: None,
        }
    }
}

fn default_max_entries() -> u64 {
    CacheConfig::default().max_entries
}

/// Partial rate limits; unset fields keep the category default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsOverride {
    #[serde(default)]
    pub max_calls_per_minute: Option<u32>,
    #[serde(default)]
    pub max_calls_per_hour: Option<u32>,
    #[serde(default)]
    pub cache_ttl_minutes: Option<u64>,
}

impl LimitsOverride {
    pub fn apply(&self, base: RateLimitConfig) -> RateLimitConfig {
        RateLimitConfig {
            max_calls_per_minute: self
                .max_calls_per_minute
                .unwrap_or(base.max_calls_per_minute),
            max_calls_per_hour: self.max_calls_per_hour.unwrap_or(base.max_calls_per_hour),
            cache_ttl_minutes: self.cache_ttl_minutes.unwrap_or(base.cache_ttl_minutes),
        }
    }
}

/// Kind of provider endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible API called with a bearer key.
    #[default]
    Openai,
    /// Endpoint that holds the key itself.
    Proxy,
}

/// One entry of the `[[providers]]` list.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ProviderKind,
    /// Base URL (openai) or full endpoint URL (proxy).
    #[serde(default)]
    pub url: Option<String>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided, must exist)
    /// 2. `~/.edubuddy/config.toml`
    /// 3. `/etc/edubuddy/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from one file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EduBuddyError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            EduBuddyError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(EduBuddyError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".edubuddy").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/edubuddy/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Rate limits for `category` after overrides.
    pub fn limits_for(&self, category: ContentCategory) -> RateLimitConfig {
        let base = RateLimitConfig::for_category(category);
        match self.limits.get(category.as_str()) {
            Some(o) => o.apply(base),
            None => base,
        }
    }

    /// Translate the configuration into a gateway builder.
    ///
    /// Opens the file store when caching is persistent. Fails with
    /// [`EduBuddyError::Configuration`] when an `openai` provider has no key.
    pub fn builder(&self, secrets: &Secrets) -> Result<EduBuddyBuilder> {
        let mut builder = EduBuddy::builder()
            .static_fallback(self.static_fallback)
            .retry(RetryConfig::from(&self.retry))
            .cache(
                CacheConfig::new()
                    .max_entries(self.cache.max_entries)
                    .persistent(self.cache.persistent),
            )
            .generation(GenerationOptions {
                model: self.generation.model.clone(),
                max_tokens: self.generation.max_tokens,
                temperature: self.generation.temperature,
                json_response: false,
            });

        for category in ContentCategory::ALL {
            builder = builder.limits(category, self.limits_for(category));
        }

        if self.cache.persistent {
            let path = self.cache.path.clone().unwrap_or_else(default_store_path);
            builder = builder.store(Arc::new(FileStore::open(path)?));
        }

        let default_provider = [ProviderConfig {
            name: "openai".to_string(),
            kind: ProviderKind::Openai,
            url: None,
        }];
        let providers = if self.providers.is_empty() {
            &default_provider[..]
        } else {
            &self.providers[..]
        };

        for provider in providers {
            builder = match provider.kind {
                ProviderKind::Proxy => {
                    let url = provider.url.clone().ok_or_else(|| {
                        EduBuddyError::Configuration(format!(
                            "proxy provider '{}' has no url",
                            provider.name
                        ))
                    })?;
                    builder.proxy(&provider.name, url)
                }
                ProviderKind::Openai => {
                    let key = secrets.api_key(&provider.name).ok_or_else(|| {
                        EduBuddyError::Configuration(format!(
                            "no API key for provider '{}' (set {} or add it to secrets.toml)",
                            provider.name,
                            env_var_for(&provider.name)
                        ))
                    })?;
                    let base = provider.url.as_deref().unwrap_or(DEFAULT_BASE_URL);
                    builder.openai_compatible(&provider.name, base, key)
                }
            };
        }

        Ok(builder)
    }
}

/// Secrets configuration (API keys), keyed by provider name.
///
/// ```toml
/// [openai]
/// api_key = "sk-..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(flatten)]
    pub keys: HashMap<String, ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Environment variable consulted for a provider's key: `OPENAI_API_KEY`
/// for `openai`, `EDGE_API_KEY` for `edge`.
pub fn env_var_for(provider: &str) -> String {
    let name: String = provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{name}_API_KEY")
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (providers may use env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".edubuddy").join("secrets.toml");
            if user_secrets.exists() {
                return Self::from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/edubuddy/secrets.toml");
        if system_secrets.exists() {
            return Self::from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file after checking its permissions.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            EduBuddyError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            EduBuddyError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            EduBuddyError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(EduBuddyError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for a provider, falling back to its environment variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.keys
            .get(provider)
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(env_var_for(provider)).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let config = Config::default();
        assert!(config.static_fallback);
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.retry.rounds, 2);
        assert_eq!(
            config.limits_for(ContentCategory::Chat),
            RateLimitConfig::for_category(ContentCategory::Chat)
        );
    }

    #[test]
    fn partial_limits_keep_category_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits.quiz]
            max_calls_per_minute = 4
            "#,
        )
        .unwrap();
        let quiz = config.limits_for(ContentCategory::Quiz);
        assert_eq!(quiz.max_calls_per_minute, 4);
        assert_eq!(quiz.max_calls_per_hour, 100);
        assert_eq!(quiz.cache_ttl_minutes, 30);
    }

    #[test]
    fn parse_provider_list() {
        let config: Config = toml::from_str(
            r#"
            [[providers]]
            name = "edge"
            kind = "proxy"
            url = "https://example.org/generate"

            [[providers]]
            name = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::Proxy);
        assert_eq!(config.providers[1].kind, ProviderKind::Openai);
        assert!(config.providers[1].url.is_none());
    }

    #[test]
    fn env_var_names() {
        assert_eq!(env_var_for("openai"), "OPENAI_API_KEY");
        assert_eq!(env_var_for("my-proxy"), "MY_PROXY_API_KEY");
    }

    #[test]
    fn proxy_without_url_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            persistent = false

            [[providers]]
            name = "edge"
            kind = "proxy"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.builder(&Secrets::default()),
            Err(EduBuddyError::Configuration(_))
        ));
    }

    #[test]
    fn secrets_from_file_table() {
        let secrets: Secrets = toml::from_str(
            r#"
            [openai]
            api_key = "sk-test"
            "#,
        )
        .unwrap();
        assert_eq!(secrets.api_key("openai"), Some("sk-test".to_string()));
    }
}
