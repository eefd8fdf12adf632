use storyforge_utils::error::ConfigError;

use super::{BackendKind, Config};

fn invalid(key: impl Into<String>, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.backend_order.is_empty() {
            return Err(invalid("backends", "no valid backend identifiers configured"));
        }

        let attempt = self.generation.attempt_timeout.as_secs();
        if !(1..=600).contains(&attempt) {
            return Err(invalid(
                "attempt_timeout_secs",
                format!("{attempt} is outside the allowed range 1..=600"),
            ));
        }

        let health = self.generation.health_timeout.as_secs();
        if !(1..=120).contains(&health) {
            return Err(invalid(
                "health_timeout_secs",
                format!("{health} is outside the allowed range 1..=120"),
            ));
        }

        let threshold = self.breaker.failure_threshold;
        if !(1..=100).contains(&threshold) {
            return Err(invalid(
                "failure_threshold",
                format!("{threshold} is outside the allowed range 1..=100"),
            ));
        }

        let reset = self.breaker.reset_timeout.as_secs();
        if !(1..=3600).contains(&reset) {
            return Err(invalid(
                "reset_timeout_secs",
                format!("{reset} is outside the allowed range 1..=3600"),
            ));
        }

        for kind in [
            BackendKind::OpenAi,
            BackendKind::Gemini,
            BackendKind::Anthropic,
            BackendKind::OpenRouter,
        ] {
            let Some(settings) = self.backends.get(kind) else {
                continue;
            };

            if let Some(max_tokens) = settings.max_tokens
                && max_tokens == 0
            {
                return Err(invalid(
                    format!("backends.{kind}.max_tokens"),
                    "must be greater than 0",
                ));
            }

            if let Some(temperature) = settings.temperature
                && !(0.0..=2.0).contains(&temperature)
            {
                return Err(invalid(
                    format!("backends.{kind}.temperature"),
                    format!("{temperature} is outside the allowed range 0.0..=2.0"),
                ));
            }

            if let Some(env_name) = &settings.api_key_env
                && env_name.trim().is_empty()
            {
                return Err(invalid(
                    format!("backends.{kind}.api_key_env"),
                    "must not be empty",
                ));
            }

            if let Some(base_url) = &settings.base_url
                && !(base_url.starts_with("https://") || base_url.starts_with("http://"))
            {
                return Err(invalid(
                    format!("backends.{kind}.base_url"),
                    format!("{base_url} must start with http:// or https://"),
                ));
            }
        }

        Ok(())
    }
}
