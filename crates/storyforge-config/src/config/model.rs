use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use storyforge_utils::types::ConfigSource;

/// Default time bound for a single backend attempt in seconds
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 90;

/// Default time bound for a single health probe in seconds
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 10;

/// Consecutive failures after which a backend's circuit opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Seconds an open circuit waits after the last failure before allowing a trial call
pub const DEFAULT_RESET_TIMEOUT_SECS: u64 = 30;

/// Fallback order used when nothing is configured
pub const DEFAULT_BACKEND_ORDER: &[BackendKind] =
    &[BackendKind::OpenAi, BackendKind::Gemini, BackendKind::Anthropic];

/// Environment variable overriding the backend fallback order
pub const BACKENDS_ENV_VAR: &str = "STORYFORGE_BACKENDS";

/// Environment variable pointing at a directory containing `config.toml`
pub const HOME_ENV_VAR: &str = "STORYFORGE_HOME";

/// Closed set of generation backends storyforge knows how to construct.
///
/// Identifiers are matched case-insensitively when parsing configuration.
///
/// ```rust
/// use storyforge_config::BackendKind;
///
/// let kind: BackendKind = "OpenAI".parse().unwrap();
/// assert_eq!(kind, BackendKind::OpenAi);
/// assert_eq!(kind.to_string(), "openai");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BackendKind {
    /// OpenAI chat completions + image generations
    OpenAi,
    /// Google Gemini `generateContent` (text and inline image parts)
    Gemini,
    /// Anthropic Messages API (narrative only)
    Anthropic,
    /// OpenRouter OpenAI-compatible chat completions (narrative only)
    OpenRouter,
}

impl BackendKind {
    /// Environment variable holding the API key unless overridden by `api_key_env`
    #[must_use]
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Backend fallback order as written in TOML: either a comma-separated string
/// or an array of identifiers.
///
/// ```toml
/// [generation]
/// backends = "openai, gemini"
/// # or
/// backends = ["openai", "gemini"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackendList {
    Csv(String),
    Items(Vec<String>),
}

impl BackendList {
    /// Raw identifiers in configured order, trimmed, with empty entries removed
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Csv(s) => s.split(',').collect(),
            Self::Items(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Result of resolving raw identifiers against [`BackendKind`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedBackendOrder {
    /// Known backends, first occurrence wins
    pub kinds: Vec<BackendKind>,
    /// Identifiers that are not in the closed set
    pub unknown: Vec<String>,
    /// Identifiers that repeated an earlier entry
    pub duplicates: Vec<String>,
}

/// Resolve raw identifiers into a de-duplicated, ordered list of backend kinds.
#[must_use]
pub fn resolve_backend_order(entries: &[String]) -> ResolvedBackendOrder {
    let mut resolved = ResolvedBackendOrder::default();
    for entry in entries {
        match entry.parse::<BackendKind>() {
            Ok(kind) if resolved.kinds.contains(&kind) => resolved.duplicates.push(entry.clone()),
            Ok(kind) => resolved.kinds.push(kind),
            Err(_) => resolved.unknown.push(entry.clone()),
        }
    }
    resolved
}

/// Per-backend settings from `[backends.<name>]`.
///
/// Every field is optional; adapters fill in their own defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Override for the provider's API base URL
    pub base_url: Option<String>,
    /// Model used for narrative generation
    pub model: Option<String>,
    /// Model used for image generation (ignored by narrative-only backends)
    pub image_model: Option<String>,
    /// Requested image size, e.g. `"1024x1024"`
    pub image_size: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// `[backends]` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendsConfig {
    pub openai: Option<BackendConfig>,
    pub gemini: Option<BackendConfig>,
    pub anthropic: Option<BackendConfig>,
    pub openrouter: Option<BackendConfig>,
}

impl BackendsConfig {
    /// Settings for one backend, if a section exists for it
    #[must_use]
    pub fn get(&self, kind: BackendKind) -> Option<&BackendConfig> {
        match kind {
            BackendKind::OpenAi => self.openai.as_ref(),
            BackendKind::Gemini => self.gemini.as_ref(),
            BackendKind::Anthropic => self.anthropic.as_ref(),
            BackendKind::OpenRouter => self.openrouter.as_ref(),
        }
    }

    /// Mutable slot for one backend's settings
    pub fn slot_mut(&mut self, kind: BackendKind) -> &mut Option<BackendConfig> {
        match kind {
            BackendKind::OpenAi => &mut self.openai,
            BackendKind::Gemini => &mut self.gemini,
            BackendKind::Anthropic => &mut self.anthropic,
            BackendKind::OpenRouter => &mut self.openrouter,
        }
    }
}

/// Resolved `[generation]` settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Backends in fallback priority order
    pub backend_order: Vec<BackendKind>,
    /// Bound on each backend attempt
    pub attempt_timeout: Duration,
    /// Bound on each health probe
    pub health_timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend_order: DEFAULT_BACKEND_ORDER.to_vec(),
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
        }
    }
}

/// Resolved `[breaker]` settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: Duration::from_secs(DEFAULT_RESET_TIMEOUT_SECS),
        }
    }
}

/// Configuration for storyforge.
///
/// Built by [`Config::discover`] (CLI semantics) or [`Config::builder`]
/// (embedding and tests). Each resolved value records where it came from in
/// `source_attribution`.
///
/// # Configuration File Format
///
/// ```toml
/// [generation]
/// backends = "openai,gemini,anthropic"
/// attempt_timeout_secs = 90
/// health_timeout_secs = 10
///
/// [breaker]
/// failure_threshold = 5
/// reset_timeout_secs = 30
///
/// [backends.openai]
/// model = "gpt-4o-mini"
/// image_model = "dall-e-3"
///
/// [backends.anthropic]
/// api_key_env = "MY_ANTHROPIC_KEY"
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub generation: GenerationConfig,
    pub breaker: BreakerConfig,
    pub backends: BackendsConfig,
    /// Source attribution for each setting (for `storyforge config`).
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Non-fatal problems found while resolving configuration
    pub warnings: Vec<String>,
}

/// `[generation]` as written in TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GenerationSection {
    pub backends: Option<BackendList>,
    pub attempt_timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
}

/// `[breaker]` as written in TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BreakerSection {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing_is_case_insensitive() {
        assert_eq!("openai".parse::<BackendKind>(), Ok(BackendKind::OpenAi));
        assert_eq!("Gemini".parse::<BackendKind>(), Ok(BackendKind::Gemini));
        assert_eq!("OPENROUTER".parse::<BackendKind>(), Ok(BackendKind::OpenRouter));
        assert!("stability".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_kind_display_matches_serde() {
        for kind in [
            BackendKind::OpenAi,
            BackendKind::Gemini,
            BackendKind::Anthropic,
            BackendKind::OpenRouter,
        ] {
            let json = toml::Value::try_from(kind).unwrap();
            assert_eq!(json.as_str(), Some(kind.to_string().as_str()));
        }
    }

    #[test]
    fn test_variant_names_cover_closed_set() {
        use strum::VariantNames;
        assert_eq!(
            BackendKind::VARIANTS,
            &["openai", "gemini", "anthropic", "openrouter"]
        );
    }

    #[test]
    fn test_backend_list_csv_entries() {
        let list = BackendList::Csv(" openai, ,gemini ,anthropic,".to_string());
        assert_eq!(list.entries(), vec!["openai", "gemini", "anthropic"]);
    }

    #[test]
    fn test_backend_list_items_entries() {
        let list = BackendList::Items(vec!["gemini".to_string(), "  ".to_string()]);
        assert_eq!(list.entries(), vec!["gemini"]);
    }

    #[test]
    fn test_resolve_backend_order_drops_unknown_and_duplicates() {
        let entries: Vec<String> = ["gemini", "midjourney", "openai", "GEMINI"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let resolved = resolve_backend_order(&entries);
        assert_eq!(resolved.kinds, vec![BackendKind::Gemini, BackendKind::OpenAi]);
        assert_eq!(resolved.unknown, vec!["midjourney"]);
        assert_eq!(resolved.duplicates, vec!["GEMINI"]);
    }

    #[test]
    fn test_default_api_key_envs() {
        assert_eq!(BackendKind::OpenAi.default_api_key_env(), "OPENAI_API_KEY");
        assert_eq!(BackendKind::Gemini.default_api_key_env(), "GEMINI_API_KEY");
    }

    #[test]
    fn test_defaults() {
        let generation = GenerationConfig::default();
        assert_eq!(
            generation.backend_order,
            vec![BackendKind::OpenAi, BackendKind::Gemini, BackendKind::Anthropic]
        );
        assert_eq!(generation.attempt_timeout, Duration::from_secs(90));

        let breaker = BreakerConfig::default();
        assert_eq!(breaker.failure_threshold, 5);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(30));
    }
}
