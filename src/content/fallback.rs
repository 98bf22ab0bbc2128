//! Static fallback content.
//!
//! Served when the network path failed and nothing is cached. Every value
//! is well-formed for its category so the UI can render it unchanged.

use super::normalize::placeholder_image;
use crate::types::{
    CanonicalContent, ChatReply, ContentCategory, ContentRequest, Game, Lesson, LessonSection,
    Quiz,
};

const CHAT_BREAK: &str = "I need a little break to think! Let's chat again in a minute. \
     While you wait, can you tell me one thing you learned today?";

/// Fallback content for `category`.
pub fn fallback_content(category: ContentCategory, request: &ContentRequest) -> CanonicalContent {
    match category {
        ContentCategory::Lesson => CanonicalContent::Lesson(fallback_lesson(request)),
        ContentCategory::Quiz => CanonicalContent::Quiz(Quiz {
            title: format!("{} quiz", request.topic_or_default()),
            topic: request.topic.clone(),
            questions: Vec::new(),
        }),
        ContentCategory::Game => CanonicalContent::Game(Game {
            title: format!("{} challenge", request.topic_or_default()),
            instructions: "This game is still warming up. Try again in a little while!"
                .to_string(),
            rounds: Vec::new(),
        }),
        ContentCategory::Chat => CanonicalContent::Chat(ChatReply {
            message: CHAT_BREAK.to_string(),
        }),
    }
}

fn fallback_lesson(request: &ContentRequest) -> Lesson {
    let topic = request.topic_or_default();
    let sections = [
        (
            format!("What is {topic}?"),
            format!("{topic} is an exciting idea to explore. Let's start with the basics."),
        ),
        (
            format!("{topic} around us"),
            format!("Look around! You can find examples of {topic} in everyday life."),
        ),
        (
            "Try it yourself".to_string(),
            format!("Grab a notebook and write down one question you have about {topic}."),
        ),
    ]
    .into_iter()
    .map(|(heading, content)| LessonSection {
        image: placeholder_image(topic, &heading),
        heading,
        content,
    })
    .collect();

    Lesson {
        title: format!("Let's learn about {topic}"),
        subject: request.subject.clone(),
        topic: request.topic.clone(),
        grade_level: request.grade_level.clone(),
        introduction: format!("Today we're going on an adventure to learn about {topic}!"),
        sections,
        conclusion: "Great job exploring! Keep asking questions.".to_string(),
        fun_facts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_is_well_formed() {
        let request = ContentRequest::new("Science", "Volcanoes", "3");
        for category in ContentCategory::ALL {
            let content = fallback_content(category, &request);
            assert_eq!(content.category(), category);
        }
        let lesson = fallback_content(ContentCategory::Lesson, &request);
        let lesson = lesson.as_lesson().unwrap();
        assert!(!lesson.sections.is_empty());
        assert!(lesson.sections.iter().all(|s| s.image.placeholder));
    }

    #[test]
    fn fallback_is_stable() {
        let request = ContentRequest::new("Science", "Volcanoes", "3");
        assert_eq!(
            fallback_content(ContentCategory::Lesson, &request),
            fallback_content(ContentCategory::Lesson, &request)
        );
    }
}
