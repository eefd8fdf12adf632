//! storyforge - narrative and image generation over interchangeable backends
//!
//! storyforge turns a short questionnaire into a structured story (title,
//! logline, themes, insight, three paragraphs) and optionally a cover image,
//! using whichever configured generation backend is currently available.
//! Backends are tried in priority order; each has its own circuit breaker so
//! a failing provider is skipped until it has had time to recover.
//!
//! storyforge can be used in two ways:
//! - **CLI**: `storyforge narrative`, `storyforge image`, `storyforge health`,
//!   `storyforge config`
//! - **Library**: build an [`Orchestrator`] from a [`Config`] and call it from
//!   your own async code
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export OPENAI_API_KEY=...
//! storyforge narrative --track-id ocean --track-title "Ocean" \
//!     --answer q1="The sea at dawn" --answer q2="A lighthouse keeper"
//!
//! # Probe every configured backend
//! storyforge health
//!
//! # Show effective configuration and where each value came from
//! storyforge config
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use storyforge::{Config, NarrativeRequest, Orchestrator};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover_from_env_and_fs()?;
//! let orchestrator = Orchestrator::from_config(&config);
//!
//! let request = NarrativeRequest::new("ocean", "Ocean", BTreeMap::new());
//! match orchestrator.generate_narrative(&request).await {
//!     Ok(story) => println!("{}", story.title()),
//!     Err(exhausted) => eprintln!("using static fallback: {exhausted}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Precedence is CLI flags > `STORYFORGE_*` environment > config file >
//! defaults. The config file is `--config PATH`, else
//! `$STORYFORGE_HOME/config.toml`, else the nearest `.storyforge/config.toml`
//! found searching upward from the working directory.

pub mod cli;

pub use storyforge_backends::{
    BackendKind, GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult,
};
pub use storyforge_config::{BackendConfig, CliArgs, Config, ConfigBuilder};
pub use storyforge_orchestrator::{
    BreakerPolicy, BreakerSnapshot, CircuitState, Clock, Orchestrator, OrchestratorBuilder,
    SystemClock,
};
pub use storyforge_utils::{
    BackendError, BackendFailure, ConfigError, ExitCode, GenerationError, StoryforgeError,
    UserFriendlyError,
};

#[doc(hidden)]
pub mod error {
    pub use storyforge_utils::error::*;
}

#[cfg(any(test, feature = "test-utils"))]
pub use storyforge_orchestrator::testing;
