//! Resolution of per-backend settings from configuration and environment

use std::time::Duration;

use storyforge_config::{BackendKind, Config};
use storyforge_utils::error::BackendError;

/// HTTP request parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            temperature: 0.8,
        }
    }
}

/// Built-in defaults for one adapter
pub(crate) struct AdapterDefaults {
    pub base_url: &'static str,
    pub model: &'static str,
    pub image_model: Option<&'static str>,
    pub image_size: Option<&'static str>,
}

/// Everything an adapter needs, with defaults applied
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub image_model: Option<String>,
    pub image_size: Option<String>,
    pub params: HttpParams,
    pub request_timeout: Duration,
}

/// Resolve settings for `kind`, reading the API key from the environment.
///
/// # Errors
///
/// Returns `BackendError::Misconfiguration` if the key variable is unset or blank.
pub(crate) fn resolve(
    kind: BackendKind,
    config: &Config,
    defaults: &AdapterDefaults,
) -> Result<ResolvedSettings, BackendError> {
    let section = config.backends.get(kind);

    let api_key_env = section
        .and_then(|s| s.api_key_env.as_deref())
        .unwrap_or_else(|| kind.default_api_key_env());

    let api_key = std::env::var(api_key_env)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            BackendError::Misconfiguration(format!(
                "{kind} API key not found in environment variable '{api_key_env}'. \
                 Set this variable or configure a different api_key_env in [backends.{kind}]."
            ))
        })?;

    let base_url = section
        .and_then(|s| s.base_url.as_deref())
        .unwrap_or(defaults.base_url)
        .trim_end_matches('/')
        .to_string();

    let fallback = HttpParams::default();

    Ok(ResolvedSettings {
        api_key,
        base_url,
        model: section
            .and_then(|s| s.model.clone())
            .unwrap_or_else(|| defaults.model.to_string()),
        image_model: section
            .and_then(|s| s.image_model.clone())
            .or_else(|| defaults.image_model.map(str::to_string)),
        image_size: section
            .and_then(|s| s.image_size.clone())
            .or_else(|| defaults.image_size.map(str::to_string)),
        params: HttpParams {
            max_tokens: section
                .and_then(|s| s.max_tokens)
                .unwrap_or(fallback.max_tokens),
            temperature: section
                .and_then(|s| s.temperature)
                .unwrap_or(fallback.temperature),
        },
        request_timeout: config.generation.attempt_timeout,
    })
}
