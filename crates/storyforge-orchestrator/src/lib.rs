//! Backend fallback orchestration for storyforge
//!
//! [`Orchestrator`] tries generation backends in configured priority order,
//! tracking a [`CircuitBreaker`] per backend so a failing provider is skipped
//! until its reset timeout has passed. Callers see a single narrative or image
//! operation; backend selection and fallback stay inside this crate.

pub mod breaker;
pub mod clock;
mod orchestrator;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use breaker::{BreakerPolicy, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, SystemClock};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};

pub use storyforge_backends::{
    BackendKind, GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult,
};
pub use storyforge_utils::error::{BackendError, BackendFailure, GenerationError};
