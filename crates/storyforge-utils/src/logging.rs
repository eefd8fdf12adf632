//! Logging and observability infrastructure for storyforge
//!
//! Structured logging goes through `tracing`. Binaries call [`init_tracing`] once;
//! library code only emits events. Backend failure messages are always passed
//! through [`redact_error_message`] before they reach a subscriber.

use std::io::IsTerminal;
use tracing::{Level, debug, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::BackendError;
use crate::redaction::redact_error_message;
use crate::types::Operation;

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence when set. Otherwise `verbose` selects between
/// `storyforge=debug` and `storyforge=info`. With `json` set, events are written
/// as one JSON object per line for log shippers.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_tracing(verbose: bool, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("storyforge=debug,warn")
            } else {
                EnvFilter::try_new("storyforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(verbose)
                    .with_span_events(if verbose {
                        FmtSpan::CLOSE
                    } else {
                        FmtSpan::NONE
                    })
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span wrapping one orchestrated generation call
pub fn generation_span(operation: Operation, backends: usize) -> tracing::Span {
    span!(
        Level::INFO,
        "generation",
        operation = %operation,
        backends = backends,
    )
}

/// Log an absorbed backend failure. The message is redacted.
pub fn log_attempt_failure(backend: &str, operation: Operation, error: &BackendError) {
    let sanitized = redact_error_message(&error.to_string());
    warn!(
        backend = %backend,
        operation = %operation,
        error_kind = error.kind(),
        error = %sanitized,
        "Backend attempt failed, continuing with next backend"
    );
}

/// Log a backend skipped because its circuit is open
pub fn log_attempt_skipped(backend: &str, operation: Operation) {
    debug!(
        backend = %backend,
        operation = %operation,
        "Skipping backend with open circuit"
    );
}
