//! Reshape raw model output into [`CanonicalContent`].
//!
//! Models return "the same" content in several shapes: sections under
//! `mainContent`, `chapters` or `sections`; section text under `content` or
//! `text`; a section title under `heading` or `title`; chapters as an array
//! or as a JSON-encoded string. Each known shape is a variant of a raw
//! input type with its own adapter into the canonical type.
//!
//! Sections without an image get a placeholder whose identifier is derived
//! from the topic and section heading, so normalizing the same input twice
//! yields the same placeholder.
//!
//! List items (sections, questions, rounds) are adapted one at a time and
//! unusable ones are skipped. The only hard failure for a lesson is having
//! no usable sections. Quizzes and games fail only when their item list is
//! missing altogether.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::extract::extract_json_object;
use crate::types::{
    CanonicalContent, ChatReply, ContentCategory, ContentRequest, Game, GameRound, Lesson,
    LessonImage, LessonSection, Quiz, QuizQuestion,
};
use crate::{EduBuddyError, Result};

/// Normalize raw provider text for `category`.
pub fn normalize(
    category: ContentCategory,
    raw: &str,
    request: &ContentRequest,
) -> Result<CanonicalContent> {
    match category {
        ContentCategory::Chat => normalize_chat(raw).map(CanonicalContent::Chat),
        ContentCategory::Lesson => {
            normalize_lesson(extract_json_object(raw)?, request).map(CanonicalContent::Lesson)
        }
        ContentCategory::Quiz => {
            normalize_quiz(extract_json_object(raw)?, request).map(CanonicalContent::Quiz)
        }
        ContentCategory::Game => {
            normalize_game(extract_json_object(raw)?, request).map(CanonicalContent::Game)
        }
    }
}

/// Chat replies are plain text.
pub fn normalize_chat(raw: &str) -> Result<ChatReply> {
    let message = raw.trim();
    if message.is_empty() {
        return Err(EduBuddyError::MalformedResponse("empty chat reply".to_string()));
    }
    Ok(ChatReply {
        message: message.to_string(),
    })
}

// ============================================================================
// Lessons
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLesson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "intro", alias = "overview")]
    introduction: Option<String>,
    #[serde(default)]
    chapters: Option<RawChapters>,
    #[serde(default)]
    main_content: Option<RawChapters>,
    #[serde(default)]
    sections: Option<RawChapters>,
    #[serde(default, alias = "summary")]
    conclusion: Option<String>,
    #[serde(default, alias = "fun_facts")]
    fun_facts: Vec<String>,
}

/// Chapters arrive either as a list or as a JSON string holding the list.
/// Items stay untyped here so one odd section cannot sink the lesson.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawChapters {
    List(Vec<Value>),
    Encoded(String),
}

impl RawChapters {
    fn into_items(self) -> Result<Vec<Value>> {
        match self {
            Self::List(items) => Ok(items),
            Self::Encoded(text) => serde_json::from_str(&text).map_err(|e| {
                EduBuddyError::MalformedResponse(format!("chapters string is not a section list: {e}"))
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSection {
    Headed {
        heading: String,
        #[serde(flatten)]
        body: RawBody,
    },
    Titled {
        title: String,
        #[serde(flatten)]
        body: RawBody,
    },
    Plain(String),
    /// Body without any heading; numbered like a plain section.
    Untitled(RawBody),
}

/// Section text and illustration. `content` and `text` are separate
/// fields so a model sending both still parses.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image: Option<RawImage>,
    #[serde(default)]
    image_url: Option<RawImage>,
    #[serde(default)]
    image_prompt: Option<String>,
}

impl RawBody {
    fn into_parts(self) -> (String, Option<RawImage>, Option<String>) {
        let text = self.content.or(self.text).unwrap_or_default();
        (text, self.image.or(self.image_url), self.image_prompt)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImage {
    Url(String),
    Descriptor {
        #[serde(default, alias = "src")]
        url: Option<String>,
        #[serde(default, alias = "description")]
        alt: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
    },
}

impl RawSection {
    fn into_section(self, topic: &str, index: usize) -> Option<LessonSection> {
        let (heading, (content, image, image_prompt)) = match self {
            Self::Headed { heading, body } => (heading, body.into_parts()),
            Self::Titled { title, body } => (title, body.into_parts()),
            Self::Plain(text) => (String::new(), (text, None, None)),
            Self::Untitled(body) => (String::new(), body.into_parts()),
        };

        let content = content.trim().to_string();
        let heading = match heading.trim() {
            "" if content.is_empty() => return None,
            "" => format!("Part {}", index + 1),
            h => h.to_string(),
        };

        let image = resolve_image(topic, &heading, image, image_prompt);
        Some(LessonSection {
            heading,
            content,
            image,
        })
    }
}

/// Adapt one chapter item, or skip it.
fn section_from(value: Value, topic: &str, index: usize) -> Option<LessonSection> {
    item_from::<RawSection>(value, "section", index)?.into_section(topic, index)
}

fn resolve_image(
    topic: &str,
    heading: &str,
    raw: Option<RawImage>,
    prompt_hint: Option<String>,
) -> LessonImage {
    let (url, alt, prompt) = match raw {
        Some(RawImage::Url(url)) => (Some(url), None, None),
        Some(RawImage::Descriptor { url, alt, prompt }) => (url, alt, prompt),
        None => (None, None, None),
    };
    let prompt = prompt.or(prompt_hint).filter(|p| !p.trim().is_empty());

    match url.filter(|u| !u.trim().is_empty()) {
        Some(url) => LessonImage {
            id: image_id(topic, heading),
            url,
            alt: alt.unwrap_or_else(|| heading.to_string()),
            prompt,
            placeholder: false,
        },
        None => {
            let mut image = placeholder_image(topic, heading);
            if let Some(alt) = alt {
                image.alt = alt;
            }
            image.prompt = prompt;
            image
        }
    }
}

/// Deterministic placeholder image for a section.
///
/// Same `(topic, heading)` always yields the same identifier and URL.
pub fn placeholder_image(topic: &str, heading: &str) -> LessonImage {
    let id = image_id(topic, heading);
    LessonImage {
        url: format!("https://picsum.photos/seed/{id}/800/450"),
        id,
        alt: heading.to_string(),
        prompt: None,
        placeholder: true,
    }
}

fn image_id(topic: &str, heading: &str) -> String {
    format!("img-{:016x}", fnv1a(&format!("{topic}|{heading}")))
}

/// 64-bit FNV-1a; stable across processes and releases, unlike `DefaultHasher`.
fn fnv1a(input: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    input
        .bytes()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Some models wrap the payload as `{"lesson": {...}}`.
fn unwrap_envelope(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.get(key).is_some_and(Value::is_object) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Normalize a raw lesson object.
pub fn normalize_lesson(value: Value, request: &ContentRequest) -> Result<Lesson> {
    let raw: RawLesson = serde_json::from_value(unwrap_envelope(value, "lesson"))
        .map_err(|e| EduBuddyError::MalformedResponse(format!("unrecognized lesson shape: {e}")))?;

    let topic = request.topic_or_default();
    let sections: Vec<LessonSection> = raw
        .chapters
        .or(raw.main_content)
        .or(raw.sections)
        .map(RawChapters::into_items)
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| section_from(item, topic, i))
        .collect();

    if sections.is_empty() {
        return Err(EduBuddyError::MalformedResponse(
            "lesson has no sections".to_string(),
        ));
    }
    debug!(topic, sections = sections.len(), "normalized lesson");

    Ok(Lesson {
        title: non_empty(raw.title).unwrap_or_else(|| format!("All about {topic}")),
        subject: request.subject.clone(),
        topic: request.topic.clone(),
        grade_level: request.grade_level.clone(),
        introduction: raw.introduction.unwrap_or_default().trim().to_string(),
        sections,
        conclusion: raw.conclusion.unwrap_or_default().trim().to_string(),
        fun_facts: raw.fun_facts,
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ============================================================================
// Quizzes
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuiz {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "quiz", alias = "items")]
    questions: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(alias = "text", alias = "prompt")]
    question: String,
    #[serde(default, alias = "choices", alias = "answers")]
    options: Vec<RawOption>,
    #[serde(default, alias = "answer", alias = "correct", alias = "correct_answer")]
    correct_answer: Option<RawAnswer>,
    #[serde(default)]
    explanation: Option<String>,
}

/// An answer option. Math quizzes often send bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl RawOption {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(n) => n.to_string(),
            Self::Flag(b) => b.to_string(),
        }
    }
}

fn option_texts(options: Vec<RawOption>) -> Vec<String> {
    options.into_iter().map(RawOption::into_text).collect()
}

/// Parse one list item, or skip it.
fn item_from<T: DeserializeOwned>(value: Value, kind: &str, index: usize) -> Option<T> {
    serde_json::from_value(value)
        .map_err(|e| debug!(kind, index, error = %e, "skipping unrecognized item"))
        .ok()
}

/// A correct answer given by position or by option text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Index(usize),
    Text(String),
}

impl RawAnswer {
    /// Resolve to an index into `options`. Accepts exact text (case- and
    /// whitespace-insensitive), a letter label ("B"), or a position.
    fn resolve(&self, options: &[String]) -> Option<usize> {
        match self {
            Self::Index(i) => (*i < options.len()).then_some(*i),
            Self::Text(text) => {
                let wanted = text.trim();
                if let Some(i) = options
                    .iter()
                    .position(|o| o.trim().eq_ignore_ascii_case(wanted))
                {
                    return Some(i);
                }
                let mut chars = wanted.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => {
                        let i = (c.to_ascii_uppercase() as u8 - b'A') as usize;
                        (i < options.len()).then_some(i)
                    }
                    _ => None,
                }
            }
        }
    }
}

/// Normalize a raw quiz object.
pub fn normalize_quiz(value: Value, request: &ContentRequest) -> Result<Quiz> {
    let raw: RawQuiz = serde_json::from_value(unwrap_envelope(value, "quiz"))
        .map_err(|e| EduBuddyError::MalformedResponse(format!("unrecognized quiz shape: {e}")))?;
    let Some(raw_questions) = raw.questions else {
        return Err(EduBuddyError::MalformedResponse(
            "quiz has no question list".to_string(),
        ));
    };

    let questions = raw_questions
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| item_from::<RawQuestion>(item, "question", i))
        .filter_map(|q| {
            let options = option_texts(q.options);
            if options.len() < 2 {
                return None;
            }
            let correct_answer = q.correct_answer.as_ref()?.resolve(&options)?;
            Some(QuizQuestion {
                question: q.question.trim().to_string(),
                options,
                correct_answer,
                explanation: non_empty(q.explanation),
            })
        })
        .collect();

    Ok(Quiz {
        title: non_empty(raw.title)
            .unwrap_or_else(|| format!("{} quiz", request.topic_or_default())),
        topic: request.topic.clone(),
        questions,
    })
}

// ============================================================================
// Games
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGame {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "description", alias = "howToPlay")]
    instructions: Option<String>,
    #[serde(default, alias = "challenges", alias = "questions", alias = "items")]
    rounds: Option<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRound {
    #[serde(alias = "question", alias = "challenge")]
    prompt: String,
    #[serde(default, alias = "correctAnswer", alias = "solution")]
    answer: Option<RawAnswer>,
    #[serde(default, alias = "options")]
    choices: Vec<RawOption>,
    #[serde(default)]
    hint: Option<String>,
}

/// Normalize a raw game object.
pub fn normalize_game(value: Value, request: &ContentRequest) -> Result<Game> {
    let raw: RawGame = serde_json::from_value(unwrap_envelope(value, "game"))
        .map_err(|e| EduBuddyError::MalformedResponse(format!("unrecognized game shape: {e}")))?;
    let Some(raw_rounds) = raw.rounds else {
        return Err(EduBuddyError::MalformedResponse(
            "game has no rounds".to_string(),
        ));
    };

    let rounds = raw_rounds
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| item_from::<RawRound>(item, "round", i))
        .filter_map(|r| {
            let choices = option_texts(r.choices);
            let answer = match r.answer? {
                RawAnswer::Text(text) => text,
                RawAnswer::Index(i) if choices.is_empty() => i.to_string(),
                RawAnswer::Index(i) => choices.get(i)?.clone(),
            };
            let answer = answer.trim().to_string();
            if answer.is_empty() {
                return None;
            }
            Some(GameRound {
                prompt: r.prompt.trim().to_string(),
                answer,
                choices,
                hint: non_empty(r.hint),
            })
        })
        .collect();

    Ok(Game {
        title: non_empty(raw.title)
            .unwrap_or_else(|| format!("{} challenge", request.topic_or_default())),
        instructions: non_empty(raw.instructions)
            .unwrap_or_else(|| "Answer each round to score a point!".to_string()),
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fractions() -> ContentRequest {
        ContentRequest::new("Math", "Fractions", "4-6")
    }

    #[test]
    fn fnv1a_known_vector() {
        assert_eq!(fnv1a(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn encoded_chapters_are_decoded() {
        let raw = json!({
            "title": "Fractions",
            "chapters": "[{\"heading\": \"Halves\", \"content\": \"Two equal parts\"}]"
        });
        let lesson = normalize_lesson(raw, &fractions()).unwrap();
        assert_eq!(lesson.sections[0].heading, "Halves");
    }

    #[test]
    fn plain_string_sections_get_numbered_headings() {
        let raw = json!({ "sections": ["First idea", "Second idea"] });
        let lesson = normalize_lesson(raw, &fractions()).unwrap();
        assert_eq!(lesson.sections[1].heading, "Part 2");
        assert_eq!(lesson.title, "All about Fractions");
    }

    #[test]
    fn lesson_envelope_is_unwrapped() {
        let raw = json!({ "lesson": { "mainContent": [{ "title": "A", "text": "b" }] } });
        assert!(normalize_lesson(raw, &fractions()).is_ok());
    }

    #[test]
    fn answer_letter_resolves() {
        let options = vec!["1/2".to_string(), "1/3".to_string()];
        assert_eq!(RawAnswer::Text("b".into()).resolve(&options), Some(1));
        assert_eq!(RawAnswer::Text(" 1/2 ".into()).resolve(&options), Some(0));
        assert_eq!(RawAnswer::Index(5).resolve(&options), None);
    }
}
