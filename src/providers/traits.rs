//! Provider trait for the outbound content call.
//!
//! A [`ContentProvider`] turns role-tagged conversation turns into generated
//! text. Providers are stored in priority order in a
//! [`ProviderChain`](super::ProviderChain), which handles timeouts, retry
//! rounds and fallback to the next endpoint. Implementations should make a
//! single attempt and report failure through the error taxonomy:
//!
//! - transport failures: `Http`, `Api { status, .. }`, `RateLimited`,
//!   `AuthenticationFailed`
//! - unusable payloads: `EmptyResponse`, `MalformedResponse`
//!
//! # Example
//!
//! ```ignore
//! async fn invoke(&self, turns: &[Message], options: &GenerationOptions) -> Result<Completion> {
//!     let text = self.backend.complete(turns, &options.model).await?;
//!     Ok(Completion { content: text, model: Some(options.model.clone()), usage: None })
//! }
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::{Completion, GenerationOptions, Message};

/// Network content provider (chat-completion style).
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Provider name for logging/metrics.
    fn name(&self) -> &str;

    /// Generate a completion for the given turns.
    async fn invoke(&self, turns: &[Message], options: &GenerationOptions) -> Result<Completion>;
}
