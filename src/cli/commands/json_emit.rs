//! JSON output for CLI commands

use anyhow::{Context, Result};
use serde::Serialize;

/// Render command output as pretty-printed JSON
pub(crate) fn emit_json<T: Serialize + ?Sized>(output: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(output).with_context(|| format!("Failed to emit {what} JSON"))
}
