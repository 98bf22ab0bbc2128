//! Composition root: one call governor per content category.

mod builder;

use std::sync::Arc;

pub use builder::EduBuddyBuilder;

use crate::Result;
use crate::governor::{CallGovernor, ContentResponse};
use crate::providers::ProviderChain;
use crate::types::{ContentCategory, ContentRequest};

/// Main entry point for requesting AI-generated content.
///
/// Owns an independent [`CallGovernor`] (ledger, cache, limits) for each
/// [`ContentCategory`]; all of them share one provider chain.
pub struct EduBuddy {
    lesson: CallGovernor,
    quiz: CallGovernor,
    game: CallGovernor,
    chat: CallGovernor,
    chain: Arc<ProviderChain>,
}

impl EduBuddy {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> EduBuddyBuilder {
        EduBuddyBuilder::new()
    }

    /// Request content of `category`.
    pub async fn request_content(
        &self,
        request: &ContentRequest,
        category: ContentCategory,
    ) -> Result<ContentResponse> {
        self.governor(category).request(request).await
    }

    /// Governor for `category`.
    pub fn governor(&self, category: ContentCategory) -> &CallGovernor {
        match category {
            ContentCategory::Lesson => &self.lesson,
            ContentCategory::Quiz => &self.quiz,
            ContentCategory::Game => &self.game,
            ContentCategory::Chat => &self.chat,
        }
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<String> {
        self.chain.names()
    }
}
