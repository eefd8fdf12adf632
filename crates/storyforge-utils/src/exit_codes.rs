//! Exit code constants and error mapping for the storyforge CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, request input, or configuration |
//! | 3 | `BACKENDS_EXHAUSTED` | Every configured backend failed or had an open circuit |

use crate::error::StoryforgeError;

/// Process exit code.
///
/// The numeric values are part of the CLI contract.
///
/// ```rust
/// use storyforge_utils::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::BACKENDS_EXHAUSTED.as_i32(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: Self = Self(0);
    pub const INTERNAL: Self = Self(1);
    pub const CLI_ARGS: Self = Self(2);
    pub const BACKENDS_EXHAUSTED: Self = Self(3);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<&StoryforgeError> for ExitCode {
    fn from(err: &StoryforgeError) -> Self {
        match err {
            StoryforgeError::Config(_) | StoryforgeError::InvalidRequest(_) => Self::CLI_ARGS,
            StoryforgeError::Generation(_) => Self::BACKENDS_EXHAUSTED,
            StoryforgeError::Io(_) => Self::INTERNAL,
        }
    }
}
