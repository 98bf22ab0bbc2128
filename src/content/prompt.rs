//! Prompt construction per content category.

use crate::types::{ContentCategory, ContentRequest, GenerationOptions, Message, Role};
use crate::{EduBuddyError, Result};

const LEARNING_BUDDY: &str = "You are Learning Buddy, a friendly and patient tutor for \
children. Use short sentences and simple words suitable for the child's age. Be \
encouraging, never scary or rude, and keep answers to a few sentences. If a question \
is not appropriate for a child, gently steer the conversation back to learning.";

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else.";

const DEFAULT_QUIZ_QUESTIONS: u32 = 5;
const DEFAULT_GAME_ROUNDS: u32 = 5;

/// Build the role-tagged turns sent to the provider.
pub fn build_turns(category: ContentCategory, request: &ContentRequest) -> Result<Vec<Message>> {
    match category {
        ContentCategory::Chat => chat_turns(request),
        ContentCategory::Lesson => Ok(vec![
            Message::system(format!(
                "You are an expert teacher who writes engaging lessons for kids. {JSON_ONLY}"
            )),
            Message::user(lesson_prompt(request)),
        ]),
        ContentCategory::Quiz => Ok(vec![
            Message::system(format!(
                "You write fun multiple-choice quizzes for kids. {JSON_ONLY}"
            )),
            Message::user(quiz_prompt(request)),
        ]),
        ContentCategory::Game => Ok(vec![
            Message::system(format!(
                "You design short learning games for kids. {JSON_ONLY}"
            )),
            Message::user(game_prompt(request)),
        ]),
    }
}

/// Generation options for `category`, with request overrides applied.
pub fn generation_options(
    category: ContentCategory,
    request: &ContentRequest,
    base: &GenerationOptions,
) -> GenerationOptions {
    let default_max = match category {
        ContentCategory::Lesson => 2000,
        ContentCategory::Quiz | ContentCategory::Game => 1500,
        ContentCategory::Chat => 500,
    };
    GenerationOptions {
        model: request.model.clone().unwrap_or_else(|| base.model.clone()),
        max_tokens: request.max_tokens.or(base.max_tokens).or(Some(default_max)),
        temperature: base.temperature.or(Some(0.7)),
        json_response: category != ContentCategory::Chat,
    }
}

fn audience(request: &ContentRequest) -> String {
    match request.grade_level.as_deref() {
        Some(grade) => format!("students in grade {grade}"),
        None => "elementary school students".to_string(),
    }
}

fn subject_clause(request: &ContentRequest) -> String {
    request
        .subject
        .as_deref()
        .map(|s| format!(" in {s}"))
        .unwrap_or_default()
}

fn lesson_prompt(request: &ContentRequest) -> String {
    let mut prompt = format!(
        "Write a lesson about \"{}\"{} for {}.",
        request.topic_or_default(),
        subject_clause(request),
        audience(request)
    );
    if let Some(difficulty) = &request.difficulty {
        prompt.push_str(&format!(" Difficulty: {difficulty}."));
    }
    prompt.push_str(
        " Use this shape: {\"title\": string, \"introduction\": string, \
         \"mainContent\": [{\"heading\": string, \"content\": string, \
         \"imagePrompt\": string}], \"conclusion\": string, \"funFacts\": [string]}. \
         Include 3 to 5 sections.",
    );
    prompt
}

fn quiz_prompt(request: &ContentRequest) -> String {
    format!(
        "Write {} multiple-choice questions about \"{}\"{} for {}. Use this shape: \
         {{\"title\": string, \"questions\": [{{\"question\": string, \"options\": \
         [string, string, string, string], \"correctAnswer\": number, \"explanation\": \
         string}}]}}. correctAnswer is the zero-based index of the right option.",
        request.item_count.unwrap_or(DEFAULT_QUIZ_QUESTIONS),
        request.topic_or_default(),
        subject_clause(request),
        audience(request)
    )
}

fn game_prompt(request: &ContentRequest) -> String {
    format!(
        "Design a learning game with {} rounds about \"{}\"{} for {}. Use this shape: \
         {{\"title\": string, \"instructions\": string, \"rounds\": [{{\"prompt\": string, \
         \"answer\": string, \"choices\": [string], \"hint\": string}}]}}.",
        request.item_count.unwrap_or(DEFAULT_GAME_ROUNDS),
        request.topic_or_default(),
        subject_clause(request),
        audience(request)
    )
}

fn chat_turns(request: &ContentRequest) -> Result<Vec<Message>> {
    if !request.turns.iter().any(|m| m.role == Role::User) {
        return Err(EduBuddyError::InvalidInput(
            "chat request has no user message".to_string(),
        ));
    }
    let mut turns = Vec::with_capacity(request.turns.len() + 1);
    turns.push(Message::system(LEARNING_BUDDY));
    // Caller-supplied system turns would override the persona.
    turns.extend(
        request
            .turns
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    Ok(turns)
}
