use std::path::PathBuf;

/// Configuration overrides supplied on the command line.
///
/// Every field is optional; `None` leaves the lower-precedence layers in charge.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file path (`--config`). Must exist when given.
    pub config_path: Option<PathBuf>,
    /// Backend fallback order (`--backends openai,gemini`)
    pub backends: Option<String>,
    /// Per-attempt timeout override in seconds
    pub attempt_timeout_secs: Option<u64>,
}
