//! Canonical content shapes delivered to the UI layer

use serde::{Deserialize, Serialize};

use super::request::ContentCategory;

/// Normalized AI-generated material, one variant per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CanonicalContent {
    Lesson(Lesson),
    Quiz(Quiz),
    Game(Game),
    Chat(ChatReply),
}

impl CanonicalContent {
    /// Category this content belongs to.
    pub fn category(&self) -> ContentCategory {
        match self {
            Self::Lesson(_) => ContentCategory::Lesson,
            Self::Quiz(_) => ContentCategory::Quiz,
            Self::Game(_) => ContentCategory::Game,
            Self::Chat(_) => ContentCategory::Chat,
        }
    }

    pub fn as_lesson(&self) -> Option<&Lesson> {
        match self {
            Self::Lesson(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_quiz(&self) -> Option<&Quiz> {
        match self {
            Self::Quiz(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_game(&self) -> Option<&Game> {
        match self {
            Self::Game(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_chat(&self) -> Option<&ChatReply> {
        match self {
            Self::Chat(c) => Some(c),
            _ => None,
        }
    }
}

/// A lesson: introduction, at least one section, conclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    pub introduction: String,
    pub sections: Vec<LessonSection>,
    pub conclusion: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fun_facts: Vec<String>,
}

/// One lesson section. Always carries an image descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSection {
    pub heading: String,
    pub content: String,
    pub image: LessonImage,
}

/// Image attached to a lesson section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonImage {
    /// Stable identifier; for placeholders derived from topic and heading.
    pub id: String,
    pub url: String,
    pub alt: String,
    /// Illustration prompt suggested by the model, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Whether this image was generated as a placeholder.
    #[serde(default)]
    pub placeholder: bool,
}

/// A multiple-choice quiz. May be empty (fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_answer: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A learning game made of short rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub title: String,
    pub instructions: String,
    pub rounds: Vec<GameRound>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRound {
    pub prompt: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// A Learning Buddy chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
}
