//! OpenRouter HTTP backend
//!
//! OpenRouter exposes an OpenAI-compatible Chat Completions API over many
//! models. Narrative only.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use storyforge_config::{BackendKind, Config};
use storyforge_utils::error::BackendError;

use crate::http_client::{HttpClient, read_json};
use crate::openai_compat::{ChatRequest, ChatResponse};
use crate::parse::parse_narrative;
use crate::prompt::narrative_prompt;
use crate::settings::{self, AdapterDefaults, ResolvedSettings};
use crate::types::{GenerationBackend, ImageRequest, ImageResult, NarrativeRequest, NarrativeResult};

const NAME: &str = "openrouter";

/// HTTP-Referer header value identifying the calling application
const DEFAULT_REFERER: &str = "https://github.com/storyforge-app/storyforge";

/// X-Title header value
const DEFAULT_TITLE: &str = "storyforge";

const DEFAULTS: AdapterDefaults = AdapterDefaults {
    base_url: "https://openrouter.ai/api/v1",
    model: "openai/gpt-4o-mini",
    image_model: None,
    image_size: None,
};

#[derive(Clone)]
pub(crate) struct OpenRouterBackend {
    client: Arc<HttpClient>,
    settings: ResolvedSettings,
}

impl OpenRouterBackend {
    pub fn new(settings: ResolvedSettings) -> Result<Self, BackendError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            settings,
        })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(settings::resolve(BackendKind::OpenRouter, config, &DEFAULTS)?)
    }

    fn with_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.settings.api_key)
            .header("HTTP-Referer", DEFAULT_REFERER)
            .header("X-Title", DEFAULT_TITLE)
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    async fn generate_narrative(
        &self,
        request: &NarrativeRequest,
    ) -> Result<NarrativeResult, BackendError> {
        let prompt = narrative_prompt(request);
        let body = ChatRequest::json_narrative(&self.settings.model, &prompt, self.settings.params);

        debug!(
            backend = NAME,
            model = %self.settings.model,
            track_id = %request.track_id,
            "Requesting narrative"
        );

        let url = format!("{}/chat/completions", self.settings.base_url);
        let builder = self.with_headers(self.client.post(&url)).json(&body);

        let response = self
            .client
            .execute_with_retry(builder, self.settings.request_timeout, NAME)
            .await?;
        let chat: ChatResponse = read_json(response, NAME).await?;
        parse_narrative(&chat.into_text(NAME)?, NAME)
    }

    async fn generate_image(
        &self,
        _request: &ImageRequest,
    ) -> Result<Option<ImageResult>, BackendError> {
        Ok(None)
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/models", self.settings.base_url);
        self.client
            .probe(self.with_headers(self.client.get(&url)), self.settings.request_timeout)
            .await
    }

    fn name(&self) -> &str {
        NAME
    }

    fn supports_images(&self) -> bool {
        false
    }
}
