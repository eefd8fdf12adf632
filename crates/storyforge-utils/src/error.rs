//! Error taxonomy for storyforge
//!
//! `BackendError` is what an adapter returns for a single attempt. The orchestrator
//! absorbs every `BackendError` into breaker bookkeeping; only
//! `GenerationError::AllBackendsExhausted` crosses the component boundary.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::Operation;

/// Top-level error type for the storyforge application surface
#[derive(Error, Debug)]
pub enum StoryforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Backend,
    Generation,
    Input,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Backend => write!(f, "Backend"),
            Self::Generation => write!(f, "Generation"),
            Self::Input => write!(f, "Input"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

/// Failure of a single backend attempt.
///
/// Every variant is recorded against the backend's circuit breaker when it occurs
/// during generation. `Misconfiguration` is only produced while constructing an
/// adapter and excludes that backend from the orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport-level failure (connection refused, DNS, TLS, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Attempt did not complete within its bound
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Response arrived but failed schema validation
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// Adapter cannot be constructed (missing credential, invalid setting)
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
}

impl BackendError {
    /// Short stable label used as a structured log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::ProviderAuth(_) => "auth",
            Self::ProviderQuota(_) => "quota",
            Self::ProviderOutage(_) => "outage",
            Self::Timeout { .. } => "timeout",
            Self::MalformedOutput(_) => "malformed_output",
            Self::Misconfiguration(_) => "misconfiguration",
        }
    }
}

impl UserFriendlyError for BackendError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Backend transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("Backend authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("Backend quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("Backend service outage: {msg}"),
            Self::Timeout { duration } => format!("Backend call timed out after {duration:?}"),
            Self::MalformedOutput(msg) => format!("Backend returned unusable output: {msg}"),
            Self::Misconfiguration(msg) => format!("Backend configuration error: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Misconfiguration(_) => Some(
                "Backends with missing credentials are excluded from the fallback order at startup."
                    .to_string(),
            ),
            Self::MalformedOutput(_) => Some(
                "Malformed output counts toward the backend's circuit breaker like any other failure."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => vec![
                "Check that the backend's api_key_env variable is set".to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Configure an additional backend later in the fallback order".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase [generation] attempt_timeout_secs".to_string()]
            }
            Self::Transport(_) | Self::MalformedOutput(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Misconfiguration(_) => ErrorCategory::Configuration,
            _ => ErrorCategory::Backend,
        }
    }
}

/// A single absorbed backend failure, kept for the exhaustion report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendFailure {
    /// Backend name as registered in the orchestrator
    pub backend: String,
    /// Stable error kind (see [`BackendError::kind`])
    pub kind: String,
    /// Redacted error message
    pub message: String,
}

/// Errors that cross the orchestrator boundary
#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    /// Every configured backend either had an open breaker or failed during this call
    #[error(
        "All generation backends exhausted for {operation}: {} failed, {} skipped with open circuit",
        .failures.len(),
        .skipped.len()
    )]
    AllBackendsExhausted {
        operation: Operation,
        failures: Vec<BackendFailure>,
        skipped: Vec<String>,
    },
}

impl UserFriendlyError for GenerationError {
    fn user_message(&self) -> String {
        match self {
            Self::AllBackendsExhausted { operation, .. } => {
                format!("No generation backend could produce a {operation}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::AllBackendsExhausted {
                failures, skipped, ..
            } => {
                let mut lines: Vec<String> = failures
                    .iter()
                    .map(|f| format!("{}: {} ({})", f.backend, f.message, f.kind))
                    .collect();
                lines.extend(skipped.iter().map(|name| format!("{name}: circuit open")));
                if lines.is_empty() {
                    Some("No backends are configured.".to_string())
                } else {
                    Some(lines.join("\n"))
                }
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Run `storyforge health` to probe every configured backend".to_string(),
            "Check that at least one backend's API key is set".to_string(),
            "Open circuits close again after [breaker] reset_timeout_secs".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Generation
    }
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some(
            "Configuration is loaded with precedence: CLI flags > STORYFORGE_* env > config file > defaults."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidValue { key, .. } if key == "backends" => vec![format!(
                "Valid backend identifiers are: {}",
                "openai, gemini, anthropic, openrouter"
            )],
            Self::NotFound { .. } => {
                vec!["Pass an existing file to --config or unset STORYFORGE_HOME".to_string()]
            }
            _ => vec!["Run `storyforge config` to inspect the effective configuration".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for StoryforgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Generation(e) => e.user_message(),
            Self::InvalidRequest(msg) => format!("Invalid request: {msg}"),
            Self::Io(e) => format!("IO error: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Generation(e) => e.context(),
            Self::InvalidRequest(_) | Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Generation(e) => e.suggestions(),
            Self::InvalidRequest(_) => vec!["Run with --help to see the expected input".to_string()],
            Self::Io(_) => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::InvalidRequest(_) => ErrorCategory::Input,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

/// Render an error as a contextual report for terminal output
#[must_use]
pub fn contextual_report(err: &dyn UserFriendlyError) -> String {
    let mut report = format!("Error [{}]: {}", err.category(), err.user_message());
    if let Some(context) = err.context() {
        report.push_str("\n\n");
        report.push_str(&context);
    }
    let suggestions = err.suggestions();
    if !suggestions.is_empty() {
        report.push_str("\n\nSuggestions:");
        for suggestion in suggestions {
            report.push_str("\n  - ");
            report.push_str(&suggestion);
        }
    }
    report
}
