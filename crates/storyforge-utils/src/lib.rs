//! Foundation utilities shared by every storyforge crate.
//!
//! - `error`: error taxonomy and user-facing error reporting
//! - `redaction`: secret scrubbing for log lines and error output
//! - `logging`: tracing initialization and structured attempt logging
//! - `exit_codes`: CLI exit code table
//! - `types`: small shared enums (`ConfigSource`, `Operation`)

pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod redaction;
pub mod types;

pub use error::{
    BackendError, BackendFailure, ConfigError, ErrorCategory, GenerationError, StoryforgeError,
    UserFriendlyError,
};
pub use exit_codes::ExitCode;
pub use types::{ConfigSource, Operation};
