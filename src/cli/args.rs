//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// storyforge - story and image generation with backend fallback
#[derive(Parser, Debug)]
#[command(name = "storyforge")]
#[command(about = "Generate narratives and images across interchangeable AI backends")]
#[command(long_about = r#"
storyforge turns questionnaire answers into a short structured story and an
optional cover image. Backends are tried in priority order; a backend that keeps
failing is skipped until its circuit breaker resets.

EXAMPLES:
  # Generate a narrative from inline answers
  storyforge narrative --track-id ocean --track-title "Ocean" \
      --answer q1="The sea at dawn" --answer q2="A lighthouse keeper"

  # Generate a narrative and a cover image, answers from a file
  storyforge narrative --track-id ocean --track-title "Ocean" \
      --answers-file answers.json --with-image

  # Generate an image from a prepared request
  storyforge image --request image-request.json

  # Only use Gemini, then Anthropic
  storyforge --backends gemini,anthropic narrative --track-id sky --track-title Sky

  # Probe every configured backend
  storyforge health

  # Show effective configuration with sources
  storyforge config

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > STORYFORGE_* env > config file > defaults
  Config file: --config PATH, else $STORYFORGE_HOME/config.toml, else the nearest
  .storyforge/config.toml searching upward from CWD

EXIT CODES:
  0 success, 1 internal error, 2 invalid arguments or configuration,
  3 all backends exhausted
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend fallback order, comma-separated (openai, gemini, anthropic, openrouter)
    #[arg(long, global = true, value_name = "LIST")]
    pub backends: Option<String>,

    /// Bound on each backend attempt in seconds (default: 90)
    #[arg(long, global = true, value_name = "SECS")]
    pub attempt_timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a narrative from questionnaire answers
    Narrative {
        /// Questionnaire track identifier
        #[arg(long)]
        track_id: String,

        /// Human-readable track title
        #[arg(long)]
        track_title: String,

        /// Answer as KEY=VALUE (repeatable; overrides --answers-file entries)
        #[arg(long = "answer", value_name = "KEY=VALUE", value_parser = parse_answer)]
        answers: Vec<(String, String)>,

        /// JSON object of answers, e.g. {"q1": "The sea at dawn"}
        #[arg(long, value_name = "FILE")]
        answers_file: Option<PathBuf>,

        /// Also generate a cover image for the narrative
        #[arg(long)]
        with_image: bool,
    },

    /// Generate an image from a JSON image request
    Image {
        /// JSON file with title, logline, track_id, track_title, themes, paragraphs
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
    },

    /// Probe every configured backend and print name -> healthy
    Health {
        /// Include circuit breaker state for each backend
        #[arg(long)]
        breakers: bool,
    },

    /// Show effective configuration and where each value came from
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    /// Short name used in error reports
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Narrative { .. } => "narrative",
            Self::Image { .. } => "image",
            Self::Health { .. } => "health",
            Self::Config { .. } => "config",
        }
    }
}

/// Parse a `KEY=VALUE` answer. The key must be non-blank; the value may be empty.
pub(crate) fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("answer key is empty in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
