use std::collections::HashMap;
use std::time::Duration;

use storyforge_utils::error::ConfigError;
use tracing::warn;

use super::{
    BackendConfig, BackendKind, BackendsConfig, BreakerConfig, Config, ConfigSource,
    GenerationConfig,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding storyforge without relying on environment
    /// variables or config files.
    ///
    /// ```rust
    /// use storyforge_config::{BackendKind, Config};
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .backends([BackendKind::Anthropic, BackendKind::OpenAi])
    ///     .attempt_timeout(Duration::from_secs(30))
    ///     .failure_threshold(3)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.generation.backend_order[0], BackendKind::Anthropic);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    backends: Option<Vec<BackendKind>>,
    attempt_timeout: Option<Duration>,
    health_timeout: Option<Duration>,
    failure_threshold: Option<u32>,
    reset_timeout: Option<Duration>,
    backend_settings: Vec<(BackendKind, BackendConfig)>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend fallback order. Repeated kinds keep their first position.
    #[must_use]
    pub fn backends(mut self, kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        self.backends = Some(kinds.into_iter().collect());
        self
    }

    #[must_use]
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = Some(timeout);
        self
    }

    /// Provide settings for one backend. A later call for the same kind replaces it.
    #[must_use]
    pub fn backend_settings(mut self, kind: BackendKind, settings: BackendConfig) -> Self {
        self.backend_settings.retain(|(k, _)| *k != kind);
        self.backend_settings.push((kind, settings));
        self
    }

    /// Build the configuration, validating every value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is out of range or the
    /// backend list is empty.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut source_attribution = HashMap::new();
        let mut warnings = Vec::new();
        let mut generation = GenerationConfig::default();
        let mut breaker = BreakerConfig::default();
        let mut backends = BackendsConfig::default();

        let mut attribute = |key: &str, set: bool| {
            let source = if set {
                ConfigSource::Programmatic
            } else {
                ConfigSource::Default
            };
            source_attribution.insert(key.to_string(), source);
        };

        attribute("backends", self.backends.is_some());
        attribute("attempt_timeout_secs", self.attempt_timeout.is_some());
        attribute("health_timeout_secs", self.health_timeout.is_some());
        attribute("failure_threshold", self.failure_threshold.is_some());
        attribute("reset_timeout_secs", self.reset_timeout.is_some());

        if let Some(kinds) = self.backends {
            let mut order: Vec<BackendKind> = Vec::with_capacity(kinds.len());
            for kind in kinds {
                if order.contains(&kind) {
                    warn!(backend = %kind, "Ignoring duplicate backend in builder");
                    warnings.push(format!("duplicate backend '{kind}' from programmatic ignored"));
                } else {
                    order.push(kind);
                }
            }
            generation.backend_order = order;
        }
        if let Some(timeout) = self.attempt_timeout {
            generation.attempt_timeout = timeout;
        }
        if let Some(timeout) = self.health_timeout {
            generation.health_timeout = timeout;
        }
        if let Some(threshold) = self.failure_threshold {
            breaker.failure_threshold = threshold;
        }
        if let Some(timeout) = self.reset_timeout {
            breaker.reset_timeout = timeout;
        }
        for (kind, settings) in self.backend_settings {
            *backends.slot_mut(kind) = Some(settings);
            attribute(&format!("backends.{kind}"), true);
        }

        let config = Config {
            generation,
            breaker,
            backends,
            source_attribution,
            warnings,
        };
        config.validate()?;
        Ok(config)
    }
}
