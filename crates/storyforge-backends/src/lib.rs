//! Generation backend abstraction for storyforge
//!
//! Every third-party service implements the [`GenerationBackend`] trait, so the
//! orchestrator can work with any of them without knowing transport details.
//! Adapters own request formatting, response parsing, and narrative
//! validation; the shared HTTP client owns retry.

mod anthropic_backend;
mod gemini_backend;
pub(crate) mod http_client;
mod normalize;
mod openai_backend;
mod openai_compat;
mod openrouter_backend;
mod parse;
mod prompt;
mod settings;
mod types;

pub use storyforge_config::BackendKind;
pub use storyforge_utils::error::BackendError;
pub use types::{
    GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult,
};

pub(crate) use anthropic_backend::AnthropicBackend;
pub(crate) use gemini_backend::GeminiBackend;
pub(crate) use openai_backend::OpenAiBackend;
pub(crate) use openrouter_backend::OpenRouterBackend;

use std::sync::Arc;
use storyforge_config::Config;

/// Construct the adapter for one backend kind.
///
/// # Errors
///
/// Returns `BackendError::Misconfiguration` if the backend's API key is
/// missing or the HTTP client cannot be built.
pub fn construct_backend(
    kind: BackendKind,
    config: &Config,
) -> Result<Arc<dyn GenerationBackend>, BackendError> {
    let backend: Arc<dyn GenerationBackend> = match kind {
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new_from_config(config)?),
        BackendKind::Gemini => Arc::new(GeminiBackend::new_from_config(config)?),
        BackendKind::Anthropic => Arc::new(AnthropicBackend::new_from_config(config)?),
        BackendKind::OpenRouter => Arc::new(OpenRouterBackend::new_from_config(config)?),
    };
    Ok(backend)
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use serial_test::serial;
    use storyforge_config::BackendConfig;

    fn config_with_key_env(kind: BackendKind, env_name: &str) -> Config {
        Config::builder()
            .backends([kind])
            .backend_settings(
                kind,
                BackendConfig {
                    api_key_env: Some(env_name.to_string()),
                    ..Default::default()
                },
            )
            .build()
            .unwrap()
    }

    #[test]
    #[serial]
    fn test_each_kind_constructs_with_key() {
        let env_name = "STORYFORGE_FACTORY_TEST_KEY";
        unsafe {
            std::env::set_var(env_name, "test-key");
        }

        for kind in [
            BackendKind::OpenAi,
            BackendKind::Gemini,
            BackendKind::Anthropic,
            BackendKind::OpenRouter,
        ] {
            let backend = construct_backend(kind, &config_with_key_env(kind, env_name)).unwrap();
            assert_eq!(backend.name(), kind.to_string());
        }

        unsafe {
            std::env::remove_var(env_name);
        }
    }

    #[test]
    #[serial]
    fn test_missing_key_is_misconfiguration_for_every_kind() {
        let env_name = "STORYFORGE_FACTORY_TEST_ABSENT";
        unsafe {
            std::env::remove_var(env_name);
        }

        for kind in [
            BackendKind::OpenAi,
            BackendKind::Gemini,
            BackendKind::Anthropic,
            BackendKind::OpenRouter,
        ] {
            match construct_backend(kind, &config_with_key_env(kind, env_name)) {
                Err(BackendError::Misconfiguration(msg)) => assert!(msg.contains(env_name)),
                Err(other) => panic!("Expected Misconfiguration for {kind}, got {other:?}"),
                Ok(_) => panic!("Expected Misconfiguration for {kind}"),
            }
        }
    }

    #[test]
    #[serial]
    fn test_image_support_advertised_per_kind() {
        let env_name = "STORYFORGE_FACTORY_TEST_IMAGES";
        unsafe {
            std::env::set_var(env_name, "test-key");
        }

        let supports = |kind| {
            construct_backend(kind, &config_with_key_env(kind, env_name))
                .unwrap()
                .supports_images()
        };
        assert!(supports(BackendKind::OpenAi));
        assert!(supports(BackendKind::Gemini));
        assert!(!supports(BackendKind::Anthropic));
        assert!(!supports(BackendKind::OpenRouter));

        unsafe {
            std::env::remove_var(env_name);
        }
    }
}
