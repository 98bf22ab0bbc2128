//! EduBuddy - throttled, cached AI content gateway
//!
//! This crate sits between an education app and the LLM API that writes
//! its lessons, quizzes, games and Learning Buddy chat replies. Each
//! content category gets a [`CallGovernor`] that
//!
//! - serves identical requests from a two-tier result cache,
//! - keeps outbound calls under per-minute and per-hour ceilings,
//! - tries a prioritized list of providers with bounded retries,
//! - falls back to cached or static content instead of failing.
//!
//! # Example
//!
//! ```rust,no_run
//! use edubuddy::{ContentCategory, ContentRequest, EduBuddy};
//!
//! #[tokio::main]
//! async fn main() -> edubuddy::Result<()> {
//!     let gateway = EduBuddy::builder()
//!         .proxy("edge", "https://example.org/functions/v1/generate")
//!         .openai("sk-your-key")
//!         .build()?;
//!
//!     let request = ContentRequest::new("Math", "Fractions", "4-6");
//!     let response = gateway
//!         .request_content(&request, ContentCategory::Lesson)
//!         .await?;
//!
//!     if let Some(lesson) = response.content.as_lesson() {
//!         println!("{} ({} sections)", lesson.title, lesson.sections.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
#[cfg(feature = "cli")]
pub mod config;
pub mod content;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod governor;
pub mod providers;
pub mod telemetry;
pub mod types;

/// Crate version.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types at crate root
pub use cache::{CacheConfig, FileStore, LocalStore, MemoryStore, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EduBuddyError, ErrorKind, Result};
pub use fingerprint::fingerprint;
pub use gateway::{EduBuddy, EduBuddyBuilder};
pub use governor::{
    CallGovernor, CallLedger, ContentResponse, ContentSource, LedgerUsage, RateLimitConfig,
};
pub use providers::{ContentProvider, OpenAiClient, ProviderChain, RetryConfig};

// Re-export all types
pub use types::{
    CanonicalContent, ChatReply, Completion, ContentCategory, ContentRequest, Game, GameRound,
    GenerationOptions, Lesson, LessonImage, LessonSection, Message, Quiz, QuizQuestion, Role,
    Usage,
};
