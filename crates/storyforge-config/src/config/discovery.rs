use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use storyforge_utils::error::ConfigError;
use tracing::warn;

use super::model::{BreakerSection, GenerationSection};
use super::{
    BACKENDS_ENV_VAR, BackendKind, BackendList, BackendsConfig, BreakerConfig, CliArgs, Config,
    ConfigSource, GenerationConfig, HOME_ENV_VAR, resolve_backend_order,
};

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    generation: Option<GenerationSection>,
    breaker: Option<BreakerSection>,
    backends: Option<BackendsConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot determine current directory: {e}"),
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        Self::discover_with_env(start_dir, cli_args, |key| std::env::var(key).ok())
    }

    /// Discovery with an injectable environment lookup.
    ///
    /// Tests use this to avoid mutating process-global state.
    pub fn discover_with_env<F>(
        start_dir: &Path,
        cli_args: &CliArgs,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut source_attribution = HashMap::new();
        let mut warnings = Vec::new();

        let mut generation = GenerationConfig::default();
        let mut breaker = BreakerConfig::default();
        let mut backends = BackendsConfig::default();

        for key in [
            "backends",
            "attempt_timeout_secs",
            "health_timeout_secs",
            "failure_threshold",
            "reset_timeout_secs",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::locate_config_file(start_dir, env(HOME_ENV_VAR).as_deref()),
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;

            if let Some(section) = file_config.generation {
                if let Some(list) = section.backends {
                    generation.backend_order =
                        resolve_layer(&list, ConfigSource::Config, &mut warnings)?;
                    source_attribution.insert("backends".to_string(), ConfigSource::Config);
                }
                if let Some(secs) = section.attempt_timeout_secs {
                    generation.attempt_timeout = Duration::from_secs(secs);
                    source_attribution
                        .insert("attempt_timeout_secs".to_string(), ConfigSource::Config);
                }
                if let Some(secs) = section.health_timeout_secs {
                    generation.health_timeout = Duration::from_secs(secs);
                    source_attribution
                        .insert("health_timeout_secs".to_string(), ConfigSource::Config);
                }
            }

            if let Some(section) = file_config.breaker {
                if let Some(threshold) = section.failure_threshold {
                    breaker.failure_threshold = threshold;
                    source_attribution.insert("failure_threshold".to_string(), ConfigSource::Config);
                }
                if let Some(secs) = section.reset_timeout_secs {
                    breaker.reset_timeout = Duration::from_secs(secs);
                    source_attribution
                        .insert("reset_timeout_secs".to_string(), ConfigSource::Config);
                }
            }

            if let Some(file_backends) = file_config.backends {
                backends = file_backends;
                for kind in [
                    BackendKind::OpenAi,
                    BackendKind::Gemini,
                    BackendKind::Anthropic,
                    BackendKind::OpenRouter,
                ] {
                    if backends.get(kind).is_some() {
                        source_attribution
                            .insert(format!("backends.{kind}"), ConfigSource::Config);
                    }
                }
            }
        }

        // Environment overrides the config file
        if let Some(raw) = env(BACKENDS_ENV_VAR)
            && !raw.trim().is_empty()
        {
            generation.backend_order =
                resolve_layer(&BackendList::Csv(raw), ConfigSource::Env, &mut warnings)?;
            source_attribution.insert("backends".to_string(), ConfigSource::Env);
        }

        // CLI overrides everything
        if let Some(raw) = &cli_args.backends {
            generation.backend_order = resolve_layer(
                &BackendList::Csv(raw.clone()),
                ConfigSource::Cli,
                &mut warnings,
            )?;
            source_attribution.insert("backends".to_string(), ConfigSource::Cli);
        }

        if let Some(secs) = cli_args.attempt_timeout_secs {
            generation.attempt_timeout = Duration::from_secs(secs);
            source_attribution.insert("attempt_timeout_secs".to_string(), ConfigSource::Cli);
        }

        let config = Self {
            generation,
            breaker,
            backends,
            source_attribution,
            warnings,
        };

        config.validate()?;

        Ok(config)
    }

    /// Locate a config file without reading it.
    ///
    /// `$STORYFORGE_HOME/config.toml` wins when it exists; otherwise the
    /// upward search from `start_dir` applies.
    fn locate_config_file(start_dir: &Path, home: Option<&str>) -> Option<PathBuf> {
        if let Some(home) = home.filter(|h| !h.trim().is_empty()) {
            let candidate = Path::new(home).join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        Self::discover_config_file_from(start_dir)
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.storyforge/config.toml`,
    /// stopping at repository root markers (.git, .hg, .svn) or filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(".storyforge").join("config.toml");
            if config_path.is_file() {
                return Some(config_path);
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                return None;
            }

            current_dir = current_dir.parent()?;
        }
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidFile(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))
    }
}

/// Resolve one layer's backend list, recording warnings for dropped entries.
fn resolve_layer(
    list: &BackendList,
    source: ConfigSource,
    warnings: &mut Vec<String>,
) -> Result<Vec<BackendKind>, ConfigError> {
    let entries = list.entries();
    let resolved = resolve_backend_order(&entries);

    for unknown in &resolved.unknown {
        warn!(backend = %unknown, source = %source, "Ignoring unknown backend identifier");
        warnings.push(format!("unknown backend '{unknown}' from {source} ignored"));
    }
    for duplicate in &resolved.duplicates {
        warn!(backend = %duplicate, source = %source, "Ignoring duplicate backend identifier");
        warnings.push(format!("duplicate backend '{duplicate}' from {source} ignored"));
    }

    if resolved.kinds.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "backends".to_string(),
            value: format!("no valid backend identifiers in {:?} ({source})", entries),
        });
    }

    Ok(resolved.kinds)
}
