//! Public types for the EduBuddy API.

mod content;
mod message;
mod options;
mod request;
mod response;

pub use content::{
    CanonicalContent, ChatReply, Game, GameRound, Lesson, LessonImage, LessonSection, Quiz,
    QuizQuestion,
};
pub use message::{Message, Role};
pub use options::{DEFAULT_MODEL, GenerationOptions};
pub use request::{ContentCategory, ContentRequest};
pub use response::{Completion, Usage};
