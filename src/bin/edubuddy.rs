//! edubuddy: generate lessons, quizzes, games and chat replies.
//!
//! Prints the delivered [`ContentResponse`](edubuddy::ContentResponse) as JSON.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::debug;

use edubuddy::config::{Config, Secrets};
use edubuddy::{ContentCategory, ContentRequest, ErrorKind, Message};

/// EduBuddy content generator
#[derive(Parser)]
#[command(name = "edubuddy")]
#[command(version = edubuddy::PKG_VERSION)]
#[command(about = "Throttled, cached AI content for young learners")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Bypass the cache read (the result is still cached).
    #[arg(long)]
    no_cache: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs)]
struct Topic {
    /// Subject, e.g. "Math"
    subject: String,
    /// Topic, e.g. "Fractions"
    topic: String,
    /// Grade level or band, e.g. "4-6"
    #[arg(short, long, default_value = "3")]
    grade: String,
    /// Difficulty hint, e.g. "easy"
    #[arg(short, long)]
    difficulty: Option<String>,
    /// Model to use (default from config)
    #[arg(short, long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a lesson
    Lesson {
        #[command(flatten)]
        topic: Topic,
    },

    /// Generate a multiple-choice quiz
    Quiz {
        #[command(flatten)]
        topic: Topic,
        /// Number of questions
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },

    /// Generate a learning game
    Game {
        #[command(flatten)]
        topic: Topic,
        /// Number of rounds
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },

    /// Ask Learning Buddy a question
    Chat {
        /// Message (or omit to read from stdin)
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let gateway = config.builder(&secrets)?.build()?;
    debug!(providers = ?gateway.provider_names(), "gateway ready");

    let (category, request) = match args.command {
        Command::Lesson { topic } => (ContentCategory::Lesson, topic_request(topic)),
        Command::Quiz { topic, count } => (ContentCategory::Quiz, with_count(topic, count)),
        Command::Game { topic, count } => (ContentCategory::Game, with_count(topic, count)),
        Command::Chat { message } => {
            let message = resolve_text(message, "chat")?;
            (
                ContentCategory::Chat,
                ContentRequest::chat(vec![Message::user(message)]),
            )
        }
    };
    let request = request.skip_cache(args.no_cache);

    let response = match gateway.request_content(&request, category).await {
        Ok(response) => response,
        Err(e) => {
            debug!(error = %e, "request failed");
            let hint = match e.kind() {
                ErrorKind::RateLimited => " (rate limited)",
                ErrorKind::GenerationFailed => "",
                ErrorKind::Configuration => " (check your configuration)",
            };
            return Err(format!("{}{hint}", e.user_message()).into());
        }
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{json}");
    Ok(())
}

fn topic_request(topic: Topic) -> ContentRequest {
    let mut request = ContentRequest::new(topic.subject, topic.topic, topic.grade);
    if let Some(difficulty) = topic.difficulty {
        request = request.difficulty(difficulty);
    }
    if let Some(model) = topic.model {
        request = request.model(model);
    }
    request
}

fn with_count(topic: Topic, count: Option<u32>) -> ContentRequest {
    let request = topic_request(topic);
    match count {
        Some(n) => request.item_count(n),
        None => request,
    }
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
