use std::collections::BTreeMap;

use super::{BackendKind, Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.copied().unwrap_or(ConfigSource::Default).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// Secrets never appear here: only the *name* of each backend's API key
    /// variable is reported.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        let order: Vec<String> = self
            .generation
            .backend_order
            .iter()
            .map(ToString::to_string)
            .collect();
        add("backends", order.join(","));
        add(
            "attempt_timeout_secs",
            self.generation.attempt_timeout.as_secs().to_string(),
        );
        add(
            "health_timeout_secs",
            self.generation.health_timeout.as_secs().to_string(),
        );
        add(
            "failure_threshold",
            self.breaker.failure_threshold.to_string(),
        );
        add(
            "reset_timeout_secs",
            self.breaker.reset_timeout.as_secs().to_string(),
        );

        for kind in &self.generation.backend_order {
            let settings = self.backends.get(*kind);
            let api_key_env = settings
                .and_then(|s| s.api_key_env.clone())
                .unwrap_or_else(|| kind.default_api_key_env().to_string());
            let key = format!("backends.{kind}");
            let source = source_label(self.source_attribution.get(&key));
            config.insert(format!("{key}.api_key_env"), (api_key_env, source.clone()));
            if let Some(model) = settings.and_then(|s| s.model.clone()) {
                config.insert(format!("{key}.model"), (model, source));
            }
        }

        config
    }
}
