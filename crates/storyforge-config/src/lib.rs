//! Configuration model, discovery, and validation for storyforge
//!
//! Configuration is hierarchical with precedence CLI > `STORYFORGE_*` environment >
//! config file > built-in defaults. The backend fallback order is resolved here into
//! a closed set of [`BackendKind`] values; unknown identifiers are dropped with a
//! startup warning.

mod config;

pub use config::*;
pub use storyforge_utils::types::ConfigSource;
