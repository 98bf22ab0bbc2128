//! Content request descriptors

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::EduBuddyError;

/// Kind of AI-generated material. Each category has its own governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Lesson,
    Quiz,
    Game,
    Chat,
}

impl ContentCategory {
    /// All categories, in display order.
    pub const ALL: [ContentCategory; 4] = [Self::Lesson, Self::Quiz, Self::Game, Self::Chat];

    /// Lowercase label used in logs, metrics and store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::Quiz => "quiz",
            Self::Game => "game",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentCategory {
    type Err = EduBuddyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lesson" => Ok(Self::Lesson),
            "quiz" => Ok(Self::Quiz),
            "game" => Ok(Self::Game),
            "chat" => Ok(Self::Chat),
            other => Err(EduBuddyError::InvalidInput(format!(
                "unknown content category: {other}"
            ))),
        }
    }
}

/// Semantic parameters identifying one logical content request.
///
/// Everything serialized here takes part in the request fingerprint;
/// `skip_cache` is a delivery hint and is deliberately excluded.
///
/// ```rust
/// # use edubuddy::ContentRequest;
/// let request = ContentRequest::new("Math", "Fractions", "4-6");
/// assert_eq!(request.topic.as_deref(), Some("Fractions"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Number of quiz questions or game rounds to ask for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<u32>,
    /// Conversation so far (Learning Buddy chat).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub turns: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    /// Bypass the cache read (the fresh result is still cached).
    #[serde(skip)]
    pub skip_cache: bool,
}

impl ContentRequest {
    /// Request about a topic within a subject for a grade band.
    pub fn new(
        subject: impl Into<String>,
        topic: impl Into<String>,
        grade_level: impl Into<String>,
    ) -> Self {
        Self {
            subject: Some(subject.into()),
            topic: Some(topic.into()),
            grade_level: Some(grade_level.into()),
            ..Self::default()
        }
    }

    /// Chat request continuing the given conversation.
    pub fn chat(turns: Vec<Message>) -> Self {
        Self {
            turns,
            ..Self::default()
        }
    }

    pub fn difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    pub fn item_count(mut self, n: u32) -> Self {
        self.item_count = Some(n);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Topic, or a generic stand-in when absent.
    pub fn topic_or_default(&self) -> &str {
        self.topic.as_deref().unwrap_or("something new")
    }
}
