//! Configuration management for storyforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > env > file > defaults. TOML files support `[generation]`, `[breaker]`
//! and `[backends.<name>]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use model::{
    BACKENDS_ENV_VAR, BackendConfig, BackendKind, BackendList, BackendsConfig, BreakerConfig,
    Config, DEFAULT_ATTEMPT_TIMEOUT_SECS, DEFAULT_BACKEND_ORDER, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_HEALTH_TIMEOUT_SECS, DEFAULT_RESET_TIMEOUT_SECS, GenerationConfig, HOME_ENV_VAR,
    ResolvedBackendOrder, resolve_backend_order,
};

use storyforge_utils::types::ConfigSource;

impl Config {
    /// Discover configuration the way the CLI does, without any CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// validation fails.
    pub fn discover_from_env_and_fs() -> Result<Self, storyforge_utils::error::ConfigError> {
        Self::discover(&CliArgs::default())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for testing purposes.
    ///
    /// Built-in defaults everywhere, no file or environment involved.
    pub fn minimal_for_testing() -> Self {
        let mut source_attribution = std::collections::HashMap::new();
        source_attribution.insert("backends".to_string(), ConfigSource::Default);
        Config {
            generation: GenerationConfig::default(),
            breaker: BreakerConfig::default(),
            backends: BackendsConfig::default(),
            source_attribution,
            warnings: Vec::new(),
        }
    }
}
