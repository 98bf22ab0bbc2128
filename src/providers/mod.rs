//! Outbound content providers.
//!
//! [`ContentProvider`] is the boundary to the network; [`ProviderChain`]
//! layers the prioritized-endpoint retry policy on top.

pub mod openai;
pub mod retry;
pub mod traits;

pub use openai::OpenAiClient;
pub use retry::{ProviderChain, RetryConfig};
pub use traits::ContentProvider;
